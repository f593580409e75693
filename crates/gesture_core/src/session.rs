//! Capture session: one camera attachment driving the smoothing pipeline.
//!
//! Every piece of per-session state (gesture history, frame budget, pending
//! frame) lives inside a single worker task. Classifier results, manual
//! overrides and the deferred frame unit are all handled on that task, so
//! state is mutated by exactly one writer and never locked.

use std::{pin::Pin, sync::Arc, time::Duration};

use async_trait::async_trait;
use shared::{
    domain::{Gesture, LandmarkFrame},
    error::{ErrorCode, FailureReport},
    protocol::{CommandSource, SessionEvent},
};
use thiserror::Error;
use tokio::{
    sync::{broadcast, mpsc, oneshot, watch},
    task::JoinHandle,
    time::{sleep_until, Instant, Sleep},
};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::{
    classifier::GestureClassifier,
    config::Settings,
    scheduler::{FrameDecision, FrameScheduler},
    sink::{CommandSink, OverlaySurface},
    smoother::TemporalSmoother,
};

const SESSION_EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub sensitivity: f32,
    pub frame_budget: Duration,
    pub render_interval: Duration,
    pub history_max: usize,
    pub history_min: usize,
}

impl SessionConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            sensitivity: settings.sensitivity,
            frame_budget: settings.frame_budget(),
            render_interval: settings.render_interval(),
            history_max: settings.history_max,
            history_min: settings.history_min,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Starting,
    Running,
    Failed(FailureReport),
    Stopped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub frames_received: u64,
    pub empty_frames: u64,
    pub rejected_labels: u64,
    pub processed_immediately: u64,
    pub processed_deferred: u64,
    pub superseded: u64,
    pub commands_committed: u64,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("capture device unavailable: {0}")]
    CaptureUnavailable(String),
    #[error("gesture classifier unavailable: {0}")]
    ClassifierUnavailable(String),
    #[error("session is no longer running")]
    Closed,
    #[error("session worker failed: {0}")]
    Worker(String),
}

impl SessionError {
    pub fn report(&self) -> FailureReport {
        let code = match self {
            SessionError::CaptureUnavailable(_) => ErrorCode::CaptureUnavailable,
            SessionError::ClassifierUnavailable(_) => ErrorCode::ClassifierUnavailable,
            SessionError::Closed | SessionError::Worker(_) => ErrorCode::Internal,
        };
        FailureReport::new(code, self.to_string())
    }
}

/// Camera/pose pipeline that feeds frames into a session.
#[async_trait]
pub trait CaptureSource: Send {
    /// Starts delivering frames into `frames`. An error here fails the
    /// session before any smoothing state is created.
    async fn start(&mut self, frames: FrameSink) -> anyhow::Result<()>;

    /// Releases the underlying device. Called after the session worker has
    /// cancelled its scheduled work.
    async fn stop(&mut self) -> anyhow::Result<()>;
}

/// Latest frame handed over by the capture source. `seq` counts every
/// delivery so the worker can tell how many frames were overwritten.
#[derive(Debug, Default)]
struct FrameSlot {
    seq: u64,
    frame: Option<LandmarkFrame>,
}

/// Cheap, cloneable handle used by capture callbacks to hand frames over.
/// Delivery never waits and overwrites any frame the worker has not picked up
/// yet; after teardown it becomes a no-op.
#[derive(Clone)]
pub struct FrameSink {
    tx: Arc<watch::Sender<FrameSlot>>,
}

impl FrameSink {
    pub fn deliver(&self, frame: LandmarkFrame) -> bool {
        if self.is_closed() {
            trace!("frame arrived after session teardown; dropped");
            return false;
        }
        self.tx.send_modify(|slot| {
            slot.seq += 1;
            slot.frame = Some(frame);
        });
        true
    }

    pub fn is_closed(&self) -> bool {
        self.tx.receiver_count() == 0
    }
}

enum SessionControl {
    Override(Gesture),
    Stats(oneshot::Sender<SessionStats>),
    Shutdown,
}

/// A configured but not yet started session. Subscribe to events and state
/// here to observe startup failures.
pub struct GestureSession {
    id: Uuid,
    config: SessionConfig,
    classifier: Arc<dyn GestureClassifier>,
    overlay: Box<dyn OverlaySurface>,
    events: broadcast::Sender<SessionEvent>,
    state_tx: watch::Sender<SessionState>,
    command_tx: watch::Sender<Gesture>,
}

impl GestureSession {
    pub fn new(
        config: SessionConfig,
        classifier: Arc<dyn GestureClassifier>,
        overlay: Box<dyn OverlaySurface>,
    ) -> Self {
        let (events, _) = broadcast::channel(SESSION_EVENT_CAPACITY);
        let (state_tx, _) = watch::channel(SessionState::Starting);
        let (command_tx, _) = watch::channel(Gesture::default());
        Self {
            id: Uuid::new_v4(),
            config,
            classifier,
            overlay,
            events,
            state_tx,
            command_tx,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    pub fn commands(&self) -> watch::Receiver<Gesture> {
        self.command_tx.subscribe()
    }

    pub async fn start(
        self,
        mut source: Box<dyn CaptureSource>,
    ) -> Result<SessionHandle, SessionError> {
        if let Err(err) = self.classifier.ready() {
            return Err(self.fail(SessionError::ClassifierUnavailable(format!("{err:#}"))));
        }

        let (frame_tx, frame_rx) = watch::channel(FrameSlot::default());
        let frames = FrameSink {
            tx: Arc::new(frame_tx),
        };
        if let Err(err) = source.start(frames.clone()).await {
            return Err(self.fail(SessionError::CaptureUnavailable(format!("{err:#}"))));
        }

        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let worker = SessionWorker {
            id: self.id,
            sensitivity: self.config.sensitivity,
            render_interval: self.config.render_interval,
            classifier: self.classifier,
            smoother: TemporalSmoother::new(self.config.history_max, self.config.history_min),
            scheduler: FrameScheduler::new(self.config.frame_budget),
            sink: CommandSink::new(
                self.id,
                self.command_tx.clone(),
                self.events.clone(),
                self.overlay,
            ),
            stats: SessionStats::default(),
        };
        let task = tokio::spawn(worker.run(frame_rx, control_rx));

        self.state_tx.send_replace(SessionState::Running);
        let _ = self.events.send(SessionEvent::Started {
            session_id: self.id,
        });
        info!(
            session_id = %self.id,
            frame_budget_ms = self.config.frame_budget.as_secs_f64() * 1000.0,
            sensitivity = self.config.sensitivity,
            "capture session started"
        );

        Ok(SessionHandle {
            id: self.id,
            frames,
            control: control_tx,
            task,
            source,
            events: self.events,
            state_tx: self.state_tx,
            command_tx: self.command_tx,
        })
    }

    fn fail(&self, err: SessionError) -> SessionError {
        error!(session_id = %self.id, "capture session failed to start: {err}");
        let report = err.report();
        self.state_tx.send_replace(SessionState::Failed(report.clone()));
        let _ = self.events.send(SessionEvent::Failed(report));
        err
    }
}

/// Handle to a running session.
pub struct SessionHandle {
    id: Uuid,
    frames: FrameSink,
    control: mpsc::UnboundedSender<SessionControl>,
    task: JoinHandle<SessionStats>,
    source: Box<dyn CaptureSource>,
    events: broadcast::Sender<SessionEvent>,
    state_tx: watch::Sender<SessionState>,
    command_tx: watch::Sender<Gesture>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn frame_sink(&self) -> FrameSink {
        self.frames.clone()
    }

    pub fn commands(&self) -> watch::Receiver<Gesture> {
        self.command_tx.subscribe()
    }

    pub fn current_command(&self) -> Gesture {
        *self.command_tx.borrow()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Sets the command directly, bypassing the smoother, and clears the
    /// gesture history.
    pub fn override_command(&self, gesture: Gesture) -> Result<(), SessionError> {
        self.control
            .send(SessionControl::Override(gesture))
            .map_err(|_| SessionError::Closed)
    }

    pub async fn stats(&self) -> Result<SessionStats, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.control
            .send(SessionControl::Stats(reply))
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Tears the session down: the worker cancels its deferred unit and
    /// discards any parked frame, then the capture source is released.
    pub async fn stop(mut self) -> Result<SessionStats, SessionError> {
        let _ = self.control.send(SessionControl::Shutdown);
        let stats = self
            .task
            .await
            .map_err(|err| SessionError::Worker(err.to_string()))?;

        if let Err(err) = self.source.stop().await {
            warn!(session_id = %self.id, "failed to release capture source: {err:#}");
        }

        self.state_tx.send_replace(SessionState::Stopped);
        let _ = self.events.send(SessionEvent::Stopped {
            session_id: self.id,
        });
        info!(
            session_id = %self.id,
            frames_received = stats.frames_received,
            processed_immediately = stats.processed_immediately,
            processed_deferred = stats.processed_deferred,
            superseded = stats.superseded,
            "capture session stopped"
        );
        Ok(stats)
    }
}

struct SessionWorker {
    id: Uuid,
    sensitivity: f32,
    render_interval: Duration,
    classifier: Arc<dyn GestureClassifier>,
    smoother: TemporalSmoother,
    scheduler: FrameScheduler<LandmarkFrame>,
    sink: CommandSink,
    stats: SessionStats,
}

impl SessionWorker {
    async fn run(
        mut self,
        mut frames: watch::Receiver<FrameSlot>,
        mut control: mpsc::UnboundedReceiver<SessionControl>,
    ) -> SessionStats {
        let mut deferred: Option<Pin<Box<Sleep>>> = None;
        let mut frames_open = true;
        let mut last_seq = 0;

        loop {
            tokio::select! {
                biased;

                cmd = control.recv() => match cmd {
                    Some(SessionControl::Override(gesture)) => {
                        self.apply_override(gesture);
                        deferred = None;
                    }
                    Some(SessionControl::Stats(reply)) => {
                        let _ = reply.send(self.stats);
                    }
                    Some(SessionControl::Shutdown) | None => break,
                },
                () = wait_deferred(&mut deferred) => {
                    deferred = None;
                    if let Some(frame) = self.scheduler.on_deferred_fire(Instant::now()) {
                        self.stats.processed_deferred += 1;
                        self.process(frame);
                    }
                }
                changed = frames.changed(), if frames_open => match changed {
                    Ok(()) => {
                        let (seq, frame) = {
                            let slot = frames.borrow_and_update();
                            (slot.seq, slot.frame.clone())
                        };
                        let arrived = seq - last_seq;
                        last_seq = seq;
                        self.stats.frames_received += arrived;
                        if arrived > 1 {
                            self.stats.superseded += arrived - 1;
                            trace!(session_id = %self.id, overwritten = arrived - 1, "frames overwritten before pickup");
                        }
                        if let Some(deadline) = frame.and_then(|frame| self.on_frame(frame)) {
                            deferred = Some(Box::pin(sleep_until(deadline)));
                        }
                    }
                    Err(_) => frames_open = false,
                },
            }
        }

        // cancel before the capture source is released by the handle
        drop(deferred);
        if self.scheduler.cancel().is_some() {
            debug!(session_id = %self.id, "discarded pending frame on teardown");
        }
        self.stats
    }

    /// Offers one frame to the scheduler. Returns the wake-up deadline when a
    /// deferred unit has to be armed.
    fn on_frame(&mut self, frame: LandmarkFrame) -> Option<Instant> {
        let now = Instant::now();
        match self.scheduler.on_frame_available(now, frame) {
            FrameDecision::ProcessNow(frame) => {
                self.stats.processed_immediately += 1;
                self.process(frame);
                None
            }
            FrameDecision::Deferred {
                schedule,
                superseded,
            } => {
                if superseded {
                    self.stats.superseded += 1;
                }
                schedule.then(|| now + self.render_interval)
            }
        }
    }

    /// Redraws the overlay, then classifies the frame and feeds the smoother.
    /// Frames the scheduler drops are never classified.
    fn process(&mut self, frame: LandmarkFrame) {
        self.sink.render(&frame);

        let Some(landmarks) = frame.landmarks() else {
            self.stats.empty_frames += 1;
            return;
        };

        let gesture = match self.classifier.classify(landmarks, self.sensitivity) {
            Ok(gesture) => gesture,
            Err(err) => {
                self.stats.rejected_labels += 1;
                warn!(session_id = %self.id, "rejected classifier output: {err}");
                return;
            }
        };

        if let Some(stable) = self.smoother.observe(gesture) {
            if self.sink.commit(stable, CommandSource::Gesture) {
                self.stats.commands_committed += 1;
            }
        }
    }

    /// Commits `gesture` directly. The parked frame predates the override, so
    /// it is dropped along with the history.
    fn apply_override(&mut self, gesture: Gesture) {
        debug!(session_id = %self.id, %gesture, "manual override");
        if self.scheduler.cancel().is_some() {
            self.stats.superseded += 1;
        }
        self.smoother.force(gesture);
        if self.sink.commit(gesture, CommandSource::Manual) {
            self.stats.commands_committed += 1;
        }
    }
}

async fn wait_deferred(slot: &mut Option<Pin<Box<Sleep>>>) {
    match slot {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
