pub mod plan;
pub mod translate;
pub mod types;
pub mod wire;

pub use plan::{import_plan_document, import_plan_file};
pub use translate::{
    mission_items_from_wire, wire_from_mission_items, AssembledMission, WireMission,
};
pub use types::{
    CameraAction, IssueSeverity, MissionIssue, MissionItem, MissionProgress, Position,
};
pub use wire::{Target, WireFrame, WireItem};
