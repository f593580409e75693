use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    CaptureUnavailable,
    ClassifierUnavailable,
    Internal,
}

/// Serializable description of a session-level failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    pub code: ErrorCode,
    pub message: String,
}

impl FailureReport {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GestureError {
    #[error("unrecognized gesture label '{0}'")]
    UnknownLabel(String),
    #[error("sensitivity {0} is outside [0, 1]")]
    SensitivityOutOfRange(f32),
    #[error("target frame rate must be positive, got {0}")]
    InvalidFrameRate(u32),
}
