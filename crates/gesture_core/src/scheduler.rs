use std::time::Duration;

use tokio::time::Instant;

/// Outcome of offering one frame to the [`FrameScheduler`].
#[derive(Debug, PartialEq)]
pub enum FrameDecision<T> {
    /// The frame budget has elapsed; process this frame now.
    ProcessNow(T),
    /// The frame was parked as the pending result.
    Deferred {
        /// Caller must arm the single deferred processing unit.
        schedule: bool,
        /// An older pending frame was overwritten.
        superseded: bool,
    },
}

/// Frame-budget throttle with most-recent-wins backpressure.
///
/// At most one deferred unit is outstanding at any time, and it always
/// processes the latest parked frame. The scheduler only tracks state; the
/// owner is responsible for arming a wake-up when told to and for calling
/// [`FrameScheduler::on_deferred_fire`] when it elapses.
#[derive(Debug)]
pub struct FrameScheduler<T> {
    budget: Duration,
    last_processed: Option<Instant>,
    pending: Option<T>,
    deferred_scheduled: bool,
}

impl<T> FrameScheduler<T> {
    pub fn new(budget: Duration) -> Self {
        Self {
            budget,
            last_processed: None,
            pending: None,
            deferred_scheduled: false,
        }
    }

    pub fn with_target_rate(frames_per_second: u32) -> Self {
        Self::new(Duration::from_secs_f64(
            1.0 / f64::from(frames_per_second.max(1)),
        ))
    }

    pub fn on_frame_available(&mut self, now: Instant, frame: T) -> FrameDecision<T> {
        let due = self
            .last_processed
            .map_or(true, |last| now.saturating_duration_since(last) >= self.budget);

        if due {
            self.last_processed = Some(now);
            self.pending = None;
            return FrameDecision::ProcessNow(frame);
        }

        let superseded = self.pending.replace(frame).is_some();
        let schedule = !self.deferred_scheduled;
        self.deferred_scheduled = true;
        FrameDecision::Deferred {
            schedule,
            superseded,
        }
    }

    /// Runs the deferred unit: frees the slot and hands back the pending
    /// frame, if one is still parked.
    pub fn on_deferred_fire(&mut self, now: Instant) -> Option<T> {
        self.deferred_scheduled = false;
        let frame = self.pending.take()?;
        self.last_processed = Some(now);
        Some(frame)
    }

    /// Teardown: drops the deferred unit and the parked frame without
    /// processing it.
    pub fn cancel(&mut self) -> Option<T> {
        self.deferred_scheduled = false;
        self.pending.take()
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_deferred_scheduled(&self) -> bool {
        self.deferred_scheduled
    }

    pub fn last_processed(&self) -> Option<Instant> {
        self.last_processed
    }
}
