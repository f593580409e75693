//! Boundary to the external single-frame gesture engine.

use anyhow::Result;
use shared::{
    domain::{Gesture, Landmark},
    error::GestureError,
};

/// Maps one frame's landmarks to an instantaneous gesture. Implementations
/// must be pure with respect to their inputs.
pub trait GestureClassifier: Send + Sync {
    fn classify(&self, landmarks: &[Landmark], sensitivity: f32) -> Result<Gesture, GestureError>;

    /// Checked once when a session starts.
    fn ready(&self) -> Result<()> {
        Ok(())
    }
}

/// Wraps an engine that reports gestures as text labels. Labels outside the
/// known set are rejected rather than mapped to REST.
pub struct LabelClassifier<F> {
    engine: F,
}

impl<F> LabelClassifier<F>
where
    F: Fn(&[Landmark], f32) -> String + Send + Sync,
{
    pub fn new(engine: F) -> Self {
        Self { engine }
    }
}

impl<F> GestureClassifier for LabelClassifier<F>
where
    F: Fn(&[Landmark], f32) -> String + Send + Sync,
{
    fn classify(&self, landmarks: &[Landmark], sensitivity: f32) -> Result<Gesture, GestureError> {
        (self.engine)(landmarks, sensitivity).parse()
    }
}
