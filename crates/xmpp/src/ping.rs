//! Connection liveness: outstanding ping bookkeeping.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use tracing::{debug, warn};

/// Unanswered pings tolerated before the session is presumed dead.
pub const DEFAULT_MAX_OUTSTANDING: usize = 5;

/// What the session should do on a supervisor tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PingAction {
    /// Send a ping with this id.
    Ping(String),
    /// Too many unanswered pings; tear the session down.
    Teardown { outstanding: usize },
}

#[derive(Debug, Clone)]
pub struct PingSupervisor {
    outstanding: HashMap<String, Instant>,
    max_outstanding: usize,
}

impl Default for PingSupervisor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_OUTSTANDING)
    }
}

impl PingSupervisor {
    pub fn new(max_outstanding: usize) -> Self {
        Self {
            outstanding: HashMap::new(),
            max_outstanding,
        }
    }

    /// Run one interval. Past the threshold the outstanding set is cleared
    /// and a teardown requested; otherwise a new ping id is recorded.
    pub fn tick(&mut self) -> PingAction {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> PingAction {
        let outstanding = self.outstanding.len();
        if outstanding > self.max_outstanding {
            warn!(outstanding, "ping threshold exceeded");
            self.outstanding.clear();
            return PingAction::Teardown { outstanding };
        }
        let id = format!("ping-{}", uuid::Uuid::new_v4().simple());
        self.outstanding.insert(id.clone(), now);
        PingAction::Ping(id)
    }

    /// A ping result arrived. Returns its round trip if the id was ours.
    pub fn on_pong(&mut self, id: &str) -> Option<Duration> {
        let issued = self.outstanding.remove(id)?;
        let rtt = issued.elapsed();
        debug!(id, rtt_ms = rtt.as_millis() as u64, "pong");
        Some(rtt)
    }

    /// Forget everything, e.g. after reconnecting.
    pub fn reset(&mut self) {
        self.outstanding.clear();
    }

    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }
}

/// Whether a status broadcast is due at `minute` past the hour.
#[must_use]
pub fn is_status_boundary(minute: u32, every_minutes: u32) -> bool {
    every_minutes > 0 && minute % every_minutes == 0
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[test]
    fn pong_clears_outstanding() {
        let mut sup = PingSupervisor::default();
        let PingAction::Ping(id) = sup.tick() else {
            panic!("expected ping");
        };
        assert_eq!(sup.outstanding(), 1);
        assert!(sup.on_pong(&id).is_some());
        assert_eq!(sup.outstanding(), 0);
        assert!(sup.on_pong(&id).is_none());
    }

    #[test]
    fn teardown_after_threshold_exceeded() {
        let mut sup = PingSupervisor::new(5);
        let mut ids = Vec::new();
        for _ in 0..6 {
            match sup.tick() {
                PingAction::Ping(id) => ids.push(id),
                other => panic!("unexpected {other:?}"),
            }
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 6);
        assert_eq!(sup.tick(), PingAction::Teardown { outstanding: 6 });
        assert_eq!(sup.outstanding(), 0);
        assert!(matches!(sup.tick(), PingAction::Ping(_)));
    }

    #[test]
    fn five_outstanding_is_still_alive() {
        let mut sup = PingSupervisor::new(5);
        for _ in 0..5 {
            sup.tick();
        }
        assert!(matches!(sup.tick(), PingAction::Ping(_)));
    }

    #[rstest]
    #[case(0, 10, true)]
    #[case(30, 10, true)]
    #[case(31, 10, false)]
    #[case(5, 0, false)]
    fn status_boundary(#[case] minute: u32, #[case] every: u32, #[case] due: bool) {
        assert_eq!(is_status_boundary(minute, every), due);
    }
}
