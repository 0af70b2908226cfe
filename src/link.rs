use mavlink::common::MavMessage;
use serde::{Deserialize, Serialize};

/// Flight modes the engine requests through the link.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FlightMode {
    Mission,
    Hold,
}

/// Outcome of an asynchronous command issued through the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Success,
    Failed,
}

pub type FlightModeCallback = Box<dyn FnOnce(CommandOutcome) + Send>;

/// Seam to the connection layer owning the MAVLink transport.
///
/// The engine never touches the transport directly; it hands fully built
/// messages to `send_message` and reads peer addressing from here. The host
/// dispatches inbound mission messages to `MissionEngine::handle_message`.
pub trait VehicleLink: Send + Sync {
    /// Non-blocking send. Returns false when the message could not be
    /// handed to the transport.
    fn send_message(&self, message: &MavMessage) -> bool;

    /// System id of the connected vehicle.
    fn system_id(&self) -> u8;

    /// Component id of the vehicle's autopilot.
    fn component_id(&self) -> u8;

    /// Whether the vehicle advertised MISSION_ITEM_INT support.
    fn supports_mission_int(&self) -> bool;

    /// Ask the connection layer to switch flight mode, completing through
    /// the callback.
    fn request_flight_mode(&self, mode: FlightMode, done: FlightModeCallback);
}
