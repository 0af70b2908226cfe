use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CameraAction {
    #[default]
    None,
    TakePhoto,
    StartPhotoInterval,
    StopPhotoInterval,
    StartVideo,
    StopVideo,
}

/// One step of a flight plan as the user sees it.
///
/// A single item can carry a waypoint plus any combination of speed change,
/// gimbal attitude, loiter and camera action; the translator flattens it
/// into as many wire items as needed. An item with nothing set contributes
/// no wire items at all.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MissionItem {
    pub position: Option<Position>,
    pub relative_altitude_m: Option<f32>,
    pub fly_through: bool,
    pub speed_m_s: Option<f32>,
    pub gimbal_pitch_deg: Option<f32>,
    pub gimbal_yaw_deg: Option<f32>,
    pub loiter_time_s: Option<f32>,
    pub camera_action: CameraAction,
    pub camera_photo_interval_s: Option<f64>,
}

impl Default for MissionItem {
    fn default() -> Self {
        Self {
            position: None,
            relative_altitude_m: None,
            fly_through: true,
            speed_m_s: None,
            gimbal_pitch_deg: None,
            gimbal_yaw_deg: None,
            loiter_time_s: None,
            camera_action: CameraAction::None,
            camera_photo_interval_s: None,
        }
    }
}

impl MissionItem {
    pub fn with_position(latitude_deg: f64, longitude_deg: f64, relative_altitude_m: f32) -> Self {
        Self {
            position: Some(Position {
                latitude_deg,
                longitude_deg,
            }),
            relative_altitude_m: Some(relative_altitude_m),
            ..Self::default()
        }
    }

    pub fn set_gimbal_pitch_and_yaw(&mut self, pitch_deg: f32, yaw_deg: f32) {
        self.gimbal_pitch_deg = Some(pitch_deg);
        self.gimbal_yaw_deg = Some(yaw_deg);
    }
}

/// Live mission progress as reported by the vehicle.
///
/// `current` is an index into the user mission items, or -1 when unknown;
/// it equals `total` once the mission has finished.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MissionProgress {
    pub current: i32,
    pub total: i32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Error,
    Warning,
}

/// A recoverable problem found while translating a mission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MissionIssue {
    pub code: String,
    pub message: String,
    pub item_index: Option<u32>,
    pub severity: IssueSeverity,
}
