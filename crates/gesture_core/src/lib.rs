//! Gesture smoothing and frame dispatch for hands-free flashcard navigation.
//!
//! Camera frames flow through a [`GestureClassifier`], a frame-budget
//! [`FrameScheduler`] and a [`TemporalSmoother`] inside a single
//! [`GestureSession`] worker; committed commands are published on a watch
//! channel. Lesson state is persisted through a debounced [`WriteQueue`].

pub mod classifier;
pub mod config;
pub mod persistence;
pub mod scheduler;
pub mod session;
pub mod sink;
pub mod smoother;
pub mod telemetry;
pub mod write_queue;

pub use classifier::{GestureClassifier, LabelClassifier};
pub use config::{load_settings, load_settings_from, ConfigError, Settings};
pub use persistence::{progress_key, LessonStore};
pub use scheduler::{FrameDecision, FrameScheduler};
pub use session::{
    CaptureSource, FrameSink, GestureSession, SessionConfig, SessionError, SessionHandle,
    SessionState, SessionStats,
};
pub use sink::{CommandSink, NullOverlay, OverlaySurface};
pub use smoother::TemporalSmoother;
pub use telemetry::{spawn_command_recorder, CommandLog};
pub use write_queue::WriteQueue;
