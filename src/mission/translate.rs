use super::types::{CameraAction, IssueSeverity, MissionIssue, MissionItem, Position};
use super::wire::{
    WireFrame, WireItem, CMD_DO_CHANGE_SPEED, CMD_DO_MOUNT_CONTROL, CMD_IMAGE_START_CAPTURE,
    CMD_IMAGE_STOP_CAPTURE, CMD_NAV_LOITER_TIME, CMD_NAV_WAYPOINT, CMD_VIDEO_START_CAPTURE,
    CMD_VIDEO_STOP_CAPTURE, MOUNT_MODE_MAVLINK_TARGETING,
};
use crate::error::{MissionError, MissionResult};
use tracing::warn;

/// Result of flattening user mission items for upload.
///
/// `index_map[wire_seq]` is the index of the user item that produced the
/// wire item; several consecutive wire items may map to the same user item.
#[derive(Debug, Clone)]
pub struct WireMission {
    pub items: Vec<WireItem>,
    pub index_map: Vec<u32>,
    pub issues: Vec<MissionIssue>,
}

/// Result of reassembling downloaded wire items into user items.
#[derive(Debug, Clone)]
pub struct AssembledMission {
    pub items: Vec<MissionItem>,
    pub index_map: Vec<u32>,
}

struct WireBuilder {
    items: Vec<WireItem>,
    index_map: Vec<u32>,
}

impl WireBuilder {
    fn push(&mut self, user_index: usize, template: WireItem) {
        // The very first wire item of the whole mission carries current = 1.
        let item = WireItem {
            seq: self.items.len() as u16,
            current: self.items.is_empty(),
            ..template
        };
        self.items.push(item);
        self.index_map.push(user_index as u32);
    }
}

fn blank_wire_item(frame: WireFrame, command: u16) -> WireItem {
    WireItem {
        seq: 0,
        frame,
        command,
        current: false,
        autocontinue: true,
        param1: f32::NAN,
        param2: f32::NAN,
        param3: f32::NAN,
        param4: f32::NAN,
        x: 0,
        y: 0,
        z: f32::NAN,
    }
}

/// Flatten user mission items into the ordered wire sequence (§ upload).
///
/// Each user item expands to up to five wire items: waypoint, speed change,
/// gimbal command, loiter, camera action. Recoverable problems (a loiter
/// before any position, a position without altitude) are reported as issues
/// and skipped; the rest of the mission still translates.
pub fn wire_from_mission_items(mission_items: &[MissionItem]) -> WireMission {
    let mut builder = WireBuilder {
        items: Vec::new(),
        index_map: Vec::new(),
    };
    let mut issues = Vec::new();

    // Loiter items reuse the coordinates of the last emitted waypoint.
    let mut last_position: Option<(WireFrame, i32, i32, f32)> = None;

    for (user_index, item) in mission_items.iter().enumerate() {
        if let (Some(position), Some(altitude)) = (item.position, item.relative_altitude_m) {
            let template = WireItem {
                param1: if item.fly_through { 0.0 } else { 0.5 },
                param2: 0.0,
                param3: 0.0,
                x: (position.latitude_deg * 1e7) as i32,
                y: (position.longitude_deg * 1e7) as i32,
                z: altitude,
                ..blank_wire_item(WireFrame::GlobalRelativeAltInt, CMD_NAV_WAYPOINT)
            };
            last_position = Some((template.frame, template.x, template.y, template.z));
            builder.push(user_index, template);
        } else if item.position.is_some() {
            warn!(user_index, "mission item has a position but no altitude");
            issues.push(MissionIssue {
                code: "item.position_without_altitude".to_string(),
                message: "Position requires a relative altitude; no waypoint emitted".to_string(),
                item_index: Some(user_index as u32),
                severity: IssueSeverity::Warning,
            });
        }

        if let Some(speed) = item.speed_m_s {
            builder.push(
                user_index,
                WireItem {
                    param1: 1.0,  // ground speed
                    param2: speed,
                    param3: -1.0, // no throttle change
                    param4: 0.0,  // absolute
                    ..blank_wire_item(WireFrame::Mission, CMD_DO_CHANGE_SPEED)
                },
            );
        }

        if item.gimbal_pitch_deg.is_some() || item.gimbal_yaw_deg.is_some() {
            builder.push(
                user_index,
                WireItem {
                    param1: item.gimbal_pitch_deg.unwrap_or(f32::NAN),
                    param2: 0.0, // roll
                    param3: item.gimbal_yaw_deg.unwrap_or(f32::NAN),
                    z: MOUNT_MODE_MAVLINK_TARGETING,
                    ..blank_wire_item(WireFrame::Mission, CMD_DO_MOUNT_CONTROL)
                },
            );
        }

        if let Some(loiter_time) = item.loiter_time_s {
            match last_position {
                Some((frame, x, y, z)) => builder.push(
                    user_index,
                    WireItem {
                        param1: loiter_time,
                        param3: 0.0, // radius
                        param4: 0.0, // loiter at center
                        x,
                        y,
                        z,
                        ..blank_wire_item(frame, CMD_NAV_LOITER_TIME)
                    },
                ),
                None => {
                    warn!(user_index, "loiter time without a previous position, dropped");
                    issues.push(MissionIssue {
                        code: "item.loiter_without_position".to_string(),
                        message: "Loiter time needs an earlier waypoint position".to_string(),
                        item_index: Some(user_index as u32),
                        severity: IssueSeverity::Warning,
                    });
                }
            }
        }

        let camera = match item.camera_action {
            CameraAction::None => None,
            CameraAction::TakePhoto => Some((CMD_IMAGE_START_CAPTURE, 0.0, 0.0, 1.0)),
            CameraAction::StartPhotoInterval => match item.camera_photo_interval_s {
                Some(interval) => Some((CMD_IMAGE_START_CAPTURE, 0.0, interval as f32, 0.0)),
                None => {
                    warn!(user_index, "photo interval action without an interval, dropped");
                    issues.push(MissionIssue {
                        code: "item.photo_interval_missing".to_string(),
                        message: "Start-photo-interval needs a photo interval; no camera item emitted"
                            .to_string(),
                        item_index: Some(user_index as u32),
                        severity: IssueSeverity::Warning,
                    });
                    None
                }
            },
            CameraAction::StopPhotoInterval => Some((CMD_IMAGE_STOP_CAPTURE, 0.0, f32::NAN, f32::NAN)),
            CameraAction::StartVideo => Some((CMD_VIDEO_START_CAPTURE, 0.0, f32::NAN, f32::NAN)),
            CameraAction::StopVideo => Some((CMD_VIDEO_STOP_CAPTURE, 0.0, f32::NAN, f32::NAN)),
        };
        if let Some((command, param1, param2, param3)) = camera {
            builder.push(
                user_index,
                WireItem {
                    param1,
                    param2,
                    param3,
                    ..blank_wire_item(WireFrame::Mission, command)
                },
            );
        }
    }

    WireMission {
        items: builder.items,
        index_map: builder.index_map,
        issues,
    }
}

/// Reassemble downloaded wire items into user mission items (§ download).
///
/// Walks the wire sequence with an accumulator: a waypoint opens a new user
/// item, subsequent speed/gimbal/loiter/camera items fold into it.
pub fn mission_items_from_wire(wire_items: &[WireItem]) -> MissionResult<AssembledMission> {
    if wire_items.is_empty() {
        return Err(MissionError::NoMissionAvailable);
    }
    if wire_items[0].command != CMD_NAV_WAYPOINT {
        warn!("first mission item is not a waypoint");
        return Err(MissionError::Unsupported);
    }

    let mut items: Vec<MissionItem> = Vec::new();
    let mut index_map = Vec::with_capacity(wire_items.len());
    let mut accumulator = MissionItem::default();
    let mut have_position = false;

    for wire_item in wire_items {
        match wire_item.command {
            CMD_NAV_WAYPOINT => {
                if wire_item.frame != WireFrame::GlobalRelativeAltInt {
                    warn!(?wire_item.frame, "waypoint frame not supported");
                    return Err(MissionError::Unsupported);
                }
                if have_position {
                    items.push(std::mem::take(&mut accumulator));
                }
                accumulator.position = Some(Position {
                    latitude_deg: f64::from(wire_item.x) * 1e-7,
                    longitude_deg: f64::from(wire_item.y) * 1e-7,
                });
                accumulator.relative_altitude_m = Some(wire_item.z);
                accumulator.fly_through = !(wire_item.param1 > 0.0);
                have_position = true;
            }
            CMD_DO_MOUNT_CONTROL => {
                if wire_item.z as i32 != MOUNT_MODE_MAVLINK_TARGETING as i32 {
                    warn!("gimbal mount mode not supported");
                    return Err(MissionError::Unsupported);
                }
                accumulator.set_gimbal_pitch_and_yaw(wire_item.param1, wire_item.param3);
            }
            CMD_IMAGE_START_CAPTURE => {
                if wire_item.param2 > 0.0 && wire_item.param3 as i32 == 0 {
                    accumulator.camera_action = CameraAction::StartPhotoInterval;
                    accumulator.camera_photo_interval_s = Some(f64::from(wire_item.param2));
                } else if wire_item.param2 as i32 == 0 && wire_item.param3 as i32 == 1 {
                    accumulator.camera_action = CameraAction::TakePhoto;
                } else {
                    warn!("IMAGE_START_CAPTURE params not supported");
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
                if wire_item.param1 as i32 == 1 && wire_item.param3 < 0.0
                    && wire_item.param4 as i32 == 0
                {
                    accumulator.speed_m_s = Some(wire_item.param2);
                } else {
                    warn!("DO_CHANGE_SPEED params not supported");
                    return Err(MissionError::Unsupported);
                }
            }
            CMD_NAV_LOITER_TIME => {
                accumulator.loiter_time_s = Some(wire_item.param1);
            }
            command => {
                warn!(command, "mission item command not supported");
                return Err(MissionError::Unsupported);
            }
        }
        index_map.push(items.len() as u32);
    }

    items.push(accumulator);

    Ok(AssembledMission { items, index_map })
}
