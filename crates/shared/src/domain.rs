use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::GestureError;

/// Discrete command recognized from a single frame, and the committed command
/// once smoothed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gesture {
    #[default]
    Rest,
    Next,
    Prev,
    Select,
}

impl Gesture {
    /// Fixed enumeration order. Majority ties resolve to the earliest entry.
    pub const ALL: [Gesture; 4] = [Gesture::Rest, Gesture::Next, Gesture::Prev, Gesture::Select];

    pub const fn index(self) -> usize {
        match self {
            Gesture::Rest => 0,
            Gesture::Next => 1,
            Gesture::Prev => 2,
            Gesture::Select => 3,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Gesture::Rest => "REST",
            Gesture::Next => "NEXT",
            Gesture::Prev => "PREV",
            Gesture::Select => "SELECT",
        }
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gesture {
    type Err = GestureError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let label = raw.trim();
        Gesture::ALL
            .into_iter()
            .find(|gesture| gesture.as_str().eq_ignore_ascii_case(label))
            .ok_or_else(|| GestureError::UnknownLabel(label.to_string()))
    }
}

/// Lesson category, e.g. `animals`. Used to namespace progress keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryId(pub String);

impl CategoryId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn default_visibility() -> f32 {
    1.0
}

/// One pose landmark in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
    #[serde(default = "default_visibility")]
    pub visibility: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32, visibility: f32) -> Self {
        Self {
            x,
            y,
            z,
            visibility,
        }
    }
}

/// Output of the pose model for one camera frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LandmarkFrame {
    Detected(Vec<Landmark>),
    #[default]
    Empty,
}

impl LandmarkFrame {
    pub fn from_landmarks(landmarks: Option<Vec<Landmark>>) -> Self {
        match landmarks {
            Some(landmarks) if !landmarks.is_empty() => LandmarkFrame::Detected(landmarks),
            _ => LandmarkFrame::Empty,
        }
    }

    pub fn landmarks(&self) -> Option<&[Landmark]> {
        match self {
            LandmarkFrame::Detected(landmarks) => Some(landmarks),
            LandmarkFrame::Empty => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, LandmarkFrame::Empty)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonProgress {
    pub index: usize,
    pub completed: bool,
    pub show_translation: bool,
}

pub const DEFAULT_SENSITIVITY: f32 = 0.12;
pub const DEFAULT_TARGET_FRAME_RATE: u32 = 30;

/// User-adjustable settings persisted between runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PersistedSettings {
    pub sensitivity: f32,
    pub target_frame_rate: u32,
}

impl Default for PersistedSettings {
    fn default() -> Self {
        Self {
            sensitivity: DEFAULT_SENSITIVITY,
            target_frame_rate: DEFAULT_TARGET_FRAME_RATE,
        }
    }
}

impl PersistedSettings {
    pub fn validate(&self) -> Result<(), GestureError> {
        if !(0.0..=1.0).contains(&self.sensitivity) {
            return Err(GestureError::SensitivityOutOfRange(self.sensitivity));
        }
        if self.target_frame_rate == 0 {
            return Err(GestureError::InvalidFrameRate(self.target_frame_rate));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_labels_case_insensitively() {
        assert_eq!("next".parse::<Gesture>().expect("next"), Gesture::Next);
        assert_eq!(" SELECT ".parse::<Gesture>().expect("select"), Gesture::Select);
        assert!(matches!(
            "WAVE".parse::<Gesture>(),
            Err(GestureError::UnknownLabel(label)) if label == "WAVE"
        ));
    }

    #[test]
    fn enumeration_order_matches_index() {
        for (position, gesture) in Gesture::ALL.iter().enumerate() {
            assert_eq!(gesture.index(), position);
        }
    }

    #[test]
    fn progress_uses_camel_case_wire_names() {
        let progress = LessonProgress {
            index: 2,
            completed: false,
            show_translation: true,
        };
        let json = serde_json::to_string(&progress).expect("json");
        assert_eq!(json, r#"{"index":2,"completed":false,"showTranslation":true}"#);
    }

    #[test]
    fn landmark_visibility_defaults_to_visible() {
        let landmark: Landmark = serde_json::from_str(r#"{"x":0.5,"y":0.25}"#).expect("landmark");
        assert_eq!(landmark.visibility, 1.0);
        assert_eq!(landmark.z, 0.0);
    }

    #[test]
    fn rejects_out_of_range_settings() {
        let settings = PersistedSettings {
            sensitivity: 1.5,
            ..PersistedSettings::default()
        };
        assert!(settings.validate().is_err());
        assert!(PersistedSettings::default().validate().is_ok());
    }
}
