use super::types::{CameraAction, MissionItem, Position};
use super::wire::{
    CMD_DO_CHANGE_SPEED, CMD_DO_MOUNT_CONTROL, CMD_IMAGE_START_CAPTURE, CMD_IMAGE_STOP_CAPTURE,
    CMD_NAV_LAND, CMD_NAV_LOITER_TIME, CMD_NAV_TAKEOFF, CMD_NAV_WAYPOINT,
    CMD_VIDEO_START_CAPTURE, CMD_VIDEO_STOP_CAPTURE,
};
use crate::error::{MissionError, MissionResult};
use serde::Deserialize;
use std::path::Path;
use tracing::warn;

/// QGroundControl-style plan document. Only `command` and the first seven
/// `params` of each item are consulted; QGC writes `null` for unused slots.
#[derive(Debug, Deserialize)]
struct PlanDocument {
    mission: PlanMission,
}

#[derive(Debug, Deserialize)]
struct PlanMission {
    items: Vec<PlanItem>,
}

#[derive(Debug, Deserialize)]
struct PlanItem {
    command: u16,
    #[serde(default)]
    params: Vec<Option<f64>>,
}

impl PlanItem {
    fn param(&self, index: usize) -> f64 {
        self.params.get(index).copied().flatten().unwrap_or(0.0)
    }
}

/// Import a mission from a plan file on disk.
pub fn import_plan_file(path: impl AsRef<Path>) -> MissionResult<Vec<MissionItem>> {
    let contents =
        std::fs::read_to_string(path).map_err(|_| MissionError::FailedToOpenPlan)?;
    import_plan_document(&contents)
}

/// Import a mission from a plan document already in memory.
pub fn import_plan_document(document: &str) -> MissionResult<Vec<MissionItem>> {
    let plan: PlanDocument =
        serde_json::from_str(document).map_err(|_| MissionError::FailedToParsePlan)?;
    build_mission_items(&plan.mission.items)
}

fn build_mission_items(plan_items: &[PlanItem]) -> MissionResult<Vec<MissionItem>> {
    let mut items: Vec<MissionItem> = Vec::new();
    let mut accumulator = MissionItem::default();
    let mut have_position = false;

    for plan_item in plan_items {
        match plan_item.command {
            CMD_NAV_WAYPOINT | CMD_NAV_TAKEOFF | CMD_NAV_LAND => {
                if have_position {
                    items.push(std::mem::take(&mut accumulator));
                }
                if plan_item.command == CMD_NAV_WAYPOINT {
                    accumulator.fly_through = !(plan_item.param(0) > 0.0);
                }
                accumulator.position = Some(Position {
                    latitude_deg: plan_item.param(4),
                    longitude_deg: plan_item.param(5),
                });
                accumulator.relative_altitude_m = Some(plan_item.param(6) as f32);
                have_position = true;
            }
            CMD_DO_MOUNT_CONTROL => {
                accumulator.set_gimbal_pitch_and_yaw(
                    plan_item.param(0) as f32,
                    plan_item.param(2) as f32,
                );
            }
            CMD_NAV_LOITER_TIME => {
                accumulator.loiter_time_s = Some(plan_item.param(0) as f32);
            }
            CMD_IMAGE_START_CAPTURE => {
                let interval = plan_item.param(1);
                let count = plan_item.param(2) as i64;
                if interval > 0.0 && count == 0 {
                    accumulator.camera_action = CameraAction::StartPhotoInterval;
                    accumulator.camera_photo_interval_s = Some(interval);
                } else if interval == 0.0 && count == 1 {
                    accumulator.camera_action = CameraAction::TakePhoto;
                } else {
                    warn!("plan IMAGE_START_CAPTURE params not supported");
                    return Err(MissionError::Unsupported);
                }
            }
            CMD_IMAGE_STOP_CAPTURE => {
                accumulator.camera_action = CameraAction::StopPhotoInterval;
            }
            CMD_VIDEO_START_CAPTURE => {
                accumulator.camera_action = CameraAction::StartVideo;
            }
            CMD_VIDEO_STOP_CAPTURE => {
                accumulator.camera_action = CameraAction::StopVideo;
            }
            CMD_DO_CHANGE_SPEED => {
                let ground_speed = plan_item.param(0) as i64 == 1;
                let throttle = plan_item.param(2);
                let absolute = plan_item.param(3) == 0.0;
                if ground_speed && throttle < 0.0 && absolute {
                    accumulator.speed_m_s = Some(plan_item.param(1) as f32);
                } else {
                    warn!("plan DO_CHANGE_SPEED params not supported");
                    return Err(MissionError::Unsupported);
                }
            }
            command => {
                warn!(command, "plan item command ignored");
            }
        }
    }

    items.push(accumulator);
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_PLAN: &str = r#"{
        "fileType": "Plan",
        "mission": {
            "items": [
                {
                    "command": 22,
                    "params": [0, 0, 0, null, 47.3977419, 8.5455938, 15]
                },
                {
                    "command": 16,
                    "params": [0, 0, 0, null, 47.3980398, 8.5450725, 15]
                },
                {
                    "command": 178,
                    "params": [1, 8, -1, 0, 0, 0, 0]
                },
                {
                    "command": 2000,
                    "params": [0, 0, 1, 0, 0, 0, 0]
                },
                {
                    "command": 16,
                    "params": [1, 0, 0, null, 47.3982, 8.5445, 15]
                }
            ]
        },
        "version": 1
    }"#;

    #[test]
    fn sample_plan_imports_three_items() {
        let items = import_plan_document(SAMPLE_PLAN).unwrap();
        assert_eq!(items.len(), 3);

        let takeoff = &items[0];
        let position = takeoff.position.unwrap();
        assert!((position.latitude_deg - 47.3977419).abs() < 1e-9);
        assert_eq!(takeoff.relative_altitude_m, Some(15.0));

        let second = &items[1];
        assert!(second.fly_through);
        assert_eq!(second.speed_m_s, Some(8.0));
        assert_eq!(second.camera_action, CameraAction::TakePhoto);

        let third = &items[2];
        assert!(!third.fly_through);
    }

    #[test]
    fn unknown_commands_are_skipped() {
        let document = r#"{
            "mission": {
                "items": [
                    { "command": 16, "params": [0, 0, 0, null, 47.0, 8.0, 10] },
                    { "command": 20, "params": [0, 0, 0, 0, 0, 0, 0] }
                ]
            }
        }"#;
        let items = import_plan_document(document).unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].position.is_some());
    }

    #[test]
    fn photo_interval_plan_item_sets_interval() {
        let document = r#"{
            "mission": {
                "items": [
                    { "command": 16, "params": [0, 0, 0, null, 47.0, 8.0, 10] },
                    { "command": 2000, "params": [0, 3, 0, 0, 0, 0, 0] }
                ]
            }
        }"#;
        let items = import_plan_document(document).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].camera_action, CameraAction::StartPhotoInterval);
        assert_eq!(items[0].camera_photo_interval_s, Some(3.0));
    }

    #[test]
    fn malformed_speed_plan_item_is_unsupported() {
        let document = r#"{
            "mission": {
                "items": [
                    { "command": 178, "params": [0, 8, -1, 0, 0, 0, 0] }
                ]
            }
        }"#;
        assert_eq!(
            import_plan_document(document).unwrap_err(),
            MissionError::Unsupported
        );
    }

    #[test]
    fn garbage_document_fails_to_parse() {
        assert_eq!(
            import_plan_document("{not json").unwrap_err(),
            MissionError::FailedToParsePlan
        );
        assert_eq!(
            import_plan_document(r#"{"mission": 4}"#).unwrap_err(),
            MissionError::FailedToParsePlan
        );
    }

    #[test]
    fn missing_file_fails_to_open() {
        assert_eq!(
            import_plan_file("/nonexistent/mission.plan").unwrap_err(),
            MissionError::FailedToOpenPlan
        );
    }
}
