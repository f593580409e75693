use shared::{
    domain::{Gesture, Landmark, LandmarkFrame},
    protocol::{CommandSource, SessionEvent},
};
use tokio::sync::{broadcast, watch};
use tracing::info;
use uuid::Uuid;

/// Drawing target for the per-frame skeleton overlay.
pub trait OverlaySurface: Send {
    fn clear(&mut self);
    fn draw_skeleton(&mut self, landmarks: &[Landmark]);
}

/// Overlay that draws nothing, for headless sessions.
#[derive(Debug, Default)]
pub struct NullOverlay;

impl OverlaySurface for NullOverlay {
    fn clear(&mut self) {}

    fn draw_skeleton(&mut self, _landmarks: &[Landmark]) {}
}

/// Where stabilized gestures become externally visible commands.
pub struct CommandSink {
    session_id: Uuid,
    command_tx: watch::Sender<Gesture>,
    events: broadcast::Sender<SessionEvent>,
    overlay: Box<dyn OverlaySurface>,
}

impl CommandSink {
    pub fn new(
        session_id: Uuid,
        command_tx: watch::Sender<Gesture>,
        events: broadcast::Sender<SessionEvent>,
        overlay: Box<dyn OverlaySurface>,
    ) -> Self {
        Self {
            session_id,
            command_tx,
            events,
            overlay,
        }
    }

    /// Redraws the overlay for the latest processed frame. Frames without
    /// landmarks only clear it.
    pub fn render(&mut self, frame: &LandmarkFrame) {
        self.overlay.clear();
        if let Some(landmarks) = frame.landmarks() {
            self.overlay.draw_skeleton(landmarks);
        }
    }

    /// Publishes `next` if it differs from the current command. Returns
    /// whether a change was published.
    pub fn commit(&mut self, next: Gesture, source: CommandSource) -> bool {
        let mut previous = next;
        let changed = self.command_tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            previous = *current;
            *current = next;
            true
        });

        if changed {
            info!(
                session_id = %self.session_id,
                from = %previous,
                to = %next,
                ?source,
                "command changed"
            );
            let _ = self.events.send(SessionEvent::CommandChanged {
                session_id: self.session_id,
                from: previous,
                to: next,
                source,
            });
        }
        changed
    }

    pub fn current(&self) -> Gesture {
        *self.command_tx.borrow()
    }
}
