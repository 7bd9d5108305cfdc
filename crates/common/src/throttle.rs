//! Rolling-window gate for operator alerts.

use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

/// Default number of alerts allowed per window.
pub const DEFAULT_MAX_ALERTS: usize = 10;

/// Default rolling window (one hour).
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60 * 60);

/// Bounded list of recently emitted alert timestamps.
///
/// Holds at most `capacity` instants. When full, the oldest entry decides:
/// a new alert is allowed only once that entry has aged out of the window.
#[derive(Debug, Clone)]
pub struct AlertThrottle {
    emitted: VecDeque<Instant>,
    capacity: usize,
    window: Duration,
}

impl Default for AlertThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ALERTS, DEFAULT_WINDOW)
    }
}

impl AlertThrottle {
    pub fn new(capacity: usize, window: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            emitted: VecDeque::with_capacity(capacity),
            capacity,
            window,
        }
    }

    /// Record an alert at `now` if the window allows it.
    pub fn try_acquire_at(&mut self, now: Instant) -> bool {
        if self.emitted.len() >= self.capacity {
            let Some(&oldest) = self.emitted.front() else {
                return false;
            };
            if now.saturating_duration_since(oldest) < self.window {
                return false;
            }
            self.emitted.pop_front();
        }
        self.emitted.push_back(now);
        true
    }

    pub fn try_acquire(&mut self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    /// Number of alerts currently counted against the window.
    #[must_use]
    pub fn len(&self) -> usize {
        self.emitted.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.emitted.is_empty()
    }
}
