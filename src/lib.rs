//! MAVLink mission transfer engine for ground control stations.
//!
//! The engine speaks the MISSION_* message family on the GCS side: it
//! uploads missions item-by-item as the autopilot pulls them, downloads the
//! mission stored on the vehicle, tracks live progress, and converts between
//! a semantic mission model and the MISSION_ITEM_INT wire representation.
//! The transport and connection layer stay outside; they are reached through
//! the [`VehicleLink`] trait and feed inbound messages to
//! [`MissionEngine::handle_message`].

pub mod config;
pub mod engine;
pub mod error;
pub mod link;
pub mod mission;
pub mod timeout;

pub use config::{EngineConfig, RetryPolicy};
pub use engine::{Activity, MissionEngine};
pub use error::{MissionError, MissionResult};
pub use link::{CommandOutcome, FlightMode, FlightModeCallback, VehicleLink};
pub use timeout::{TimeoutCookie, TimeoutManager};

pub use mission::{
    import_plan_document, import_plan_file, mission_items_from_wire, wire_from_mission_items,
    CameraAction, IssueSeverity, MissionIssue, MissionItem, MissionProgress, Position, WireFrame,
    WireItem,
};
