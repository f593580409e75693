use std::collections::VecDeque;

use shared::domain::Gesture;

pub const DEFAULT_HISTORY_MAX: usize = 7;
pub const DEFAULT_HISTORY_MIN: usize = 4;

/// Rolling majority vote over the most recent instantaneous gestures.
///
/// The committed value starts at REST and only moves once at least
/// `history_min` observations are held and the majority differs from it.
#[derive(Debug, Clone)]
pub struct TemporalSmoother {
    history: VecDeque<Gesture>,
    history_max: usize,
    history_min: usize,
    stable: Gesture,
}

impl TemporalSmoother {
    pub fn new(history_max: usize, history_min: usize) -> Self {
        let history_max = history_max.max(1);
        Self {
            history: VecDeque::with_capacity(history_max + 1),
            history_max,
            history_min: history_min.clamp(1, history_max),
            stable: Gesture::default(),
        }
    }

    /// Records one observation. Returns the new committed gesture when it
    /// changed, `None` otherwise.
    pub fn observe(&mut self, gesture: Gesture) -> Option<Gesture> {
        self.history.push_back(gesture);
        if self.history.len() > self.history_max {
            self.history.pop_front();
        }

        let majority = self.majority()?;
        if majority == self.stable {
            return None;
        }
        self.stable = majority;
        Some(majority)
    }

    /// Majority over the current window, or `None` below `history_min`.
    pub fn majority(&self) -> Option<Gesture> {
        if self.history.len() < self.history_min {
            return None;
        }

        let mut counts = [0usize; Gesture::ALL.len()];
        for gesture in &self.history {
            counts[gesture.index()] += 1;
        }

        let mut best = Gesture::ALL[0];
        let mut best_count = counts[best.index()];
        for gesture in Gesture::ALL.into_iter().skip(1) {
            if counts[gesture.index()] > best_count {
                best = gesture;
                best_count = counts[gesture.index()];
            }
        }
        Some(best)
    }

    /// Manual override: commits `gesture` directly and forgets the history so
    /// stale frames cannot vote on the next decision.
    pub fn force(&mut self, gesture: Gesture) {
        self.history.clear();
        self.stable = gesture;
    }

    pub fn stable(&self) -> Gesture {
        self.stable
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn history(&self) -> impl Iterator<Item = Gesture> + '_ {
        self.history.iter().copied()
    }
}

impl Default for TemporalSmoother {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_MAX, DEFAULT_HISTORY_MIN)
    }
}

#[cfg(test)]
#[path = "tests/smoother_proptests.rs"]
mod proptests;
