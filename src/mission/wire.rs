use crate::error::{MissionError, MissionResult};
use mavlink::common::{self, MavFrame, MavMissionResult, MavMissionType};
use serde::{Deserialize, Serialize};

pub(crate) const CMD_NAV_WAYPOINT: u16 = 16;
pub(crate) const CMD_NAV_LOITER_TIME: u16 = 19;
pub(crate) const CMD_NAV_LAND: u16 = 21;
pub(crate) const CMD_NAV_TAKEOFF: u16 = 22;
pub(crate) const CMD_DO_CHANGE_SPEED: u16 = 178;
pub(crate) const CMD_DO_MOUNT_CONTROL: u16 = 205;
pub(crate) const CMD_IMAGE_START_CAPTURE: u16 = 2000;
pub(crate) const CMD_IMAGE_STOP_CAPTURE: u16 = 2001;
pub(crate) const CMD_VIDEO_START_CAPTURE: u16 = 2500;
pub(crate) const CMD_VIDEO_STOP_CAPTURE: u16 = 2501;

/// MAV_MOUNT_MODE_MAVLINK_TARGETING, carried in `z` of a mount-control item.
pub(crate) const MOUNT_MODE_MAVLINK_TARGETING: f32 = 2.0;

/// Peer addressing for outgoing mission messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub system_id: u8,
    pub component_id: u8,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WireFrame {
    Mission,
    GlobalInt,
    GlobalRelativeAltInt,
    Other,
}

/// Flat mirror of MISSION_ITEM_INT. `x`/`y` are latitude/longitude scaled by
/// 1e7 for global frames; params may be NaN where the command leaves them
/// unused.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireItem {
    pub seq: u16,
    pub frame: WireFrame,
    pub command: u16,
    pub current: bool,
    pub autocontinue: bool,
    pub param1: f32,
    pub param2: f32,
    pub param3: f32,
    pub param4: f32,
    pub x: i32,
    pub y: i32,
    pub z: f32,
}

fn to_mav_frame(frame: WireFrame) -> MavFrame {
    #[allow(deprecated)]
    match frame {
        WireFrame::Mission => MavFrame::MAV_FRAME_MISSION,
        WireFrame::GlobalInt => MavFrame::MAV_FRAME_GLOBAL_INT,
        WireFrame::GlobalRelativeAltInt => MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT_INT,
        WireFrame::Other => MavFrame::MAV_FRAME_MISSION,
    }
}

#[allow(deprecated)]
fn from_mav_frame(frame: MavFrame) -> WireFrame {
    match frame {
        MavFrame::MAV_FRAME_MISSION => WireFrame::Mission,
        MavFrame::MAV_FRAME_GLOBAL | MavFrame::MAV_FRAME_GLOBAL_INT => WireFrame::GlobalInt,
        MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT
        | MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT_INT => WireFrame::GlobalRelativeAltInt,
        _ => WireFrame::Other,
    }
}

pub fn mission_count(target: Target, count: u16) -> common::MavMessage {
    common::MavMessage::MISSION_COUNT(common::MISSION_COUNT_DATA {
        count,
        target_system: target.system_id,
        target_component: target.component_id,
        mission_type: MavMissionType::MAV_MISSION_TYPE_MISSION,
        opaque_id: 0,
    })
}

pub fn mission_request_int(target: Target, seq: u16) -> common::MavMessage {
    common::MavMessage::MISSION_REQUEST_INT(common::MISSION_REQUEST_INT_DATA {
        seq,
        target_system: target.system_id,
        target_component: target.component_id,
        mission_type: MavMissionType::MAV_MISSION_TYPE_MISSION,
    })
}

pub fn mission_request_list(target: Target) -> common::MavMessage {
    common::MavMessage::MISSION_REQUEST_LIST(common::MISSION_REQUEST_LIST_DATA {
        target_system: target.system_id,
        target_component: target.component_id,
        mission_type: MavMissionType::MAV_MISSION_TYPE_MISSION,
    })
}

pub fn mission_ack(target: Target, code: MavMissionResult) -> common::MavMessage {
    common::MavMessage::MISSION_ACK(common::MISSION_ACK_DATA {
        target_system: target.system_id,
        target_component: target.component_id,
        mavtype: code,
        mission_type: MavMissionType::MAV_MISSION_TYPE_MISSION,
        opaque_id: 0,
    })
}

/// Vehicle-side progress report; built here for tests and simulators.
pub fn mission_current(seq: u16) -> common::MavMessage {
    common::MavMessage::MISSION_CURRENT(common::MISSION_CURRENT_DATA {
        seq,
        ..Default::default()
    })
}

/// Vehicle-side completion report; built here for tests and simulators.
pub fn mission_item_reached(seq: u16) -> common::MavMessage {
    common::MavMessage::MISSION_ITEM_REACHED(common::MISSION_ITEM_REACHED_DATA { seq })
}

pub fn mission_set_current(target: Target, seq: u16) -> common::MavMessage {
    common::MavMessage::MISSION_SET_CURRENT(common::MISSION_SET_CURRENT_DATA {
        seq,
        target_system: target.system_id,
        target_component: target.component_id,
    })
}

pub fn mission_item_int(target: Target, item: &WireItem) -> MissionResult<common::MavMessage> {
    let command = num_traits::FromPrimitive::from_u16(item.command)
        .ok_or(MissionError::Unsupported)?;

    Ok(common::MavMessage::MISSION_ITEM_INT(
        common::MISSION_ITEM_INT_DATA {
            param1: item.param1,
            param2: item.param2,
            param3: item.param3,
            param4: item.param4,
            x: item.x,
            y: item.y,
            z: item.z,
            seq: item.seq,
            command,
            target_system: target.system_id,
            target_component: target.component_id,
            frame: to_mav_frame(item.frame),
            current: u8::from(item.current),
            autocontinue: u8::from(item.autocontinue),
            mission_type: MavMissionType::MAV_MISSION_TYPE_MISSION,
        },
    ))
}

pub fn wire_item_from_message(data: &common::MISSION_ITEM_INT_DATA) -> WireItem {
    WireItem {
        seq: data.seq,
        frame: from_mav_frame(data.frame),
        command: data.command as u16,
        current: data.current > 0,
        autocontinue: data.autocontinue > 0,
        param1: data.param1,
        param2: data.param2,
        param3: data.param3,
        param4: data.param4,
        x: data.x,
        y: data.y,
        z: data.z,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: Target = Target {
        system_id: 1,
        component_id: 1,
    };

    fn sample_item() -> WireItem {
        WireItem {
            seq: 3,
            frame: WireFrame::GlobalRelativeAltInt,
            command: CMD_NAV_WAYPOINT,
            current: false,
            autocontinue: true,
            param1: 0.0,
            param2: 0.0,
            param3: 0.0,
            param4: f32::NAN,
            x: 473977000,
            y: 85456000,
            z: 10.0,
        }
    }

    #[test]
    fn count_message_addresses_the_peer() {
        let message = mission_count(TARGET, 7);
        match message {
            common::MavMessage::MISSION_COUNT(data) => {
                assert_eq!(data.count, 7);
                assert_eq!(data.target_system, 1);
                assert_eq!(data.target_component, 1);
                assert_eq!(data.mission_type, MavMissionType::MAV_MISSION_TYPE_MISSION);
            }
            other => panic!("expected MISSION_COUNT, got {other:?}"),
        }
    }

    #[test]
    fn item_int_roundtrips_through_the_wire_struct() {
        let item = sample_item();
        let message = mission_item_int(TARGET, &item).unwrap();
        let data = match message {
            common::MavMessage::MISSION_ITEM_INT(data) => data,
            other => panic!("expected MISSION_ITEM_INT, got {other:?}"),
        };

        assert_eq!(data.seq, 3);
        assert_eq!(data.x, 473977000);
        assert_eq!(data.y, 85456000);
        assert_eq!(data.current, 0);
        assert_eq!(data.autocontinue, 1);

        let parsed = wire_item_from_message(&data);
        assert_eq!(parsed.seq, item.seq);
        assert_eq!(parsed.frame, WireFrame::GlobalRelativeAltInt);
        assert_eq!(parsed.command, CMD_NAV_WAYPOINT);
        assert_eq!(parsed.x, item.x);
        assert_eq!(parsed.y, item.y);
        assert!(parsed.param4.is_nan());
    }

    #[test]
    fn item_int_rejects_unknown_commands() {
        let mut item = sample_item();
        item.command = 0xFFFF;
        assert_eq!(
            mission_item_int(TARGET, &item).unwrap_err(),
            MissionError::Unsupported
        );
    }

    #[test]
    #[allow(deprecated)]
    fn frame_read_accepts_both_int_and_plain_variants() {
        assert_eq!(
            from_mav_frame(MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT),
            WireFrame::GlobalRelativeAltInt
        );
        assert_eq!(
            from_mav_frame(MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT_INT),
            WireFrame::GlobalRelativeAltInt
        );
        assert_eq!(
            from_mav_frame(MavFrame::MAV_FRAME_LOCAL_NED),
            WireFrame::Other
        );
    }
}
