use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use tracing::debug;

use crate::clock::Clock;

#[derive(Debug, Clone, Copy)]
pub struct GuardConfig {
    /// Attempts allowed inside one window before the circuit opens.
    pub max_attempts: u32,
    /// A record idle for longer than this starts over.
    pub reset_window: Duration,
    /// How long an open circuit stays open.
    pub cooldown: Duration,
    pub sweep_interval: Duration,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            reset_window: Duration::from_millis(3000),
            cooldown: Duration::from_millis(3000),
            sweep_interval: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationAttempt {
    pub count: u32,
    pub last_attempt_ms: i64,
}

impl NavigationAttempt {
    fn first(now_ms: i64) -> Self {
        Self {
            count: 1,
            last_attempt_ms: now_ms,
        }
    }
}

/// Per-path navigation rate limiter. Each client gets its own instance
/// behind its [`RouteAuthorizer`](super::authorization::RouteAuthorizer).
pub struct NavigationGuard {
    config: GuardConfig,
    clock: Arc<dyn Clock>,
    attempts: DashMap<String, NavigationAttempt>,
}

impl NavigationGuard {
    pub fn new(config: GuardConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            attempts: DashMap::new(),
        }
    }

    /// Records a navigation attempt to `path` and reports whether it may
    /// proceed.
    pub fn can_navigate(&self, path: &str) -> bool {
        let now = self.clock.now_ms();
        let reset_ms = millis(self.config.reset_window);
        let cooldown_ms = millis(self.config.cooldown);

        let mut entry = match self.attempts.entry(path.to_string()) {
            Entry::Vacant(vacant) => {
                vacant.insert(NavigationAttempt::first(now));
                return true;
            }
            Entry::Occupied(occupied) => occupied,
        };

        let attempt = entry.get_mut();
        let age = now - attempt.last_attempt_ms;

        if age > reset_ms {
            *attempt = NavigationAttempt::first(now);
            return true;
        }

        if attempt.count > self.config.max_attempts {
            if age < cooldown_ms {
                return false;
            }
            *attempt = NavigationAttempt::first(now);
            return true;
        }

        attempt.count += 1;
        attempt.last_attempt_ms = now;

        if attempt.count > self.config.max_attempts {
            debug!(path, count = attempt.count, "navigation circuit opened");
            return false;
        }
        true
    }

    /// Same check as the blocking branch of [`can_navigate`](Self::can_navigate),
    /// without recording anything.
    pub fn is_blocked(&self, path: &str) -> bool {
        let now = self.clock.now_ms();
        self.attempts.get(path).is_some_and(|attempt| {
            attempt.count > self.config.max_attempts
                && now - attempt.last_attempt_ms < millis(self.config.cooldown)
        })
    }

    /// Forgets one path, or every path when `path` is `None`.
    pub fn reset(&self, path: Option<&str>) {
        match path {
            Some(path) => {
                self.attempts.remove(path);
            }
            None => self.attempts.clear(),
        }
    }

    pub fn attempt(&self, path: &str) -> Option<NavigationAttempt> {
        self.attempts.get(path).map(|attempt| *attempt)
    }

    pub fn tracked_paths(&self) -> usize {
        self.attempts.len()
    }

    /// Drops records whose last attempt is older than the cooldown window.
    /// Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_ms();
        let cooldown_ms = millis(self.config.cooldown);
        let before = self.attempts.len();

        self.attempts
            .retain(|_, attempt| now - attempt.last_attempt_ms <= cooldown_ms);

        before.saturating_sub(self.attempts.len())
    }
}

fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{GuardConfig, NavigationGuard};
    use crate::clock::ManualClock;

    const PATH: &str = "/retailer-dashboard";

    fn guard() -> (NavigationGuard, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        (NavigationGuard::new(GuardConfig::default(), clock.clone()), clock)
    }

    #[test]
    fn sixth_attempt_inside_window_is_blocked() {
        let (guard, clock) = guard();

        for _ in 0..5 {
            assert!(guard.can_navigate(PATH));
            clock.advance_ms(100);
        }

        assert!(!guard.can_navigate(PATH));
        assert!(!guard.can_navigate(PATH));
        assert!(guard.is_blocked(PATH));
    }

    #[test]
    fn circuit_closes_once_cooldown_elapses_from_first_block() {
        let (guard, clock) = guard();
        for _ in 0..6 {
            guard.can_navigate(PATH);
        }
        assert!(guard.is_blocked(PATH));

        clock.advance_ms(2_000);
        assert!(!guard.can_navigate(PATH));

        clock.advance_ms(1_000);
        assert!(!guard.is_blocked(PATH));
        assert!(guard.can_navigate(PATH));
        assert_eq!(guard.attempt(PATH).map(|a| a.count), Some(1));
    }

    #[test]
    fn idle_record_resets_after_window() {
        let (guard, clock) = guard();
        for _ in 0..4 {
            guard.can_navigate(PATH);
        }

        clock.advance_ms(3_001);
        assert!(guard.can_navigate(PATH));
        assert_eq!(guard.attempt(PATH).map(|a| a.count), Some(1));
    }

    #[test]
    fn reset_path_allows_next_attempt() {
        let (guard, _clock) = guard();
        for _ in 0..8 {
            guard.can_navigate(PATH);
        }
        assert!(guard.is_blocked(PATH));

        guard.reset(Some(PATH));
        assert!(guard.can_navigate(PATH));
    }

    #[test]
    fn reset_all_clears_every_path() {
        let (guard, _clock) = guard();
        guard.can_navigate("/a");
        guard.can_navigate("/b");

        guard.reset(None);
        assert_eq!(guard.tracked_paths(), 0);
    }

    #[test]
    fn is_blocked_never_changes_state() {
        let (guard, _clock) = guard();
        for _ in 0..5 {
            guard.can_navigate(PATH);
        }
        let before = guard.attempt(PATH);

        for _ in 0..20 {
            assert!(!guard.is_blocked(PATH));
        }
        assert!(!guard.is_blocked("/never-visited"));

        assert_eq!(guard.attempt(PATH), before);
        assert_eq!(guard.tracked_paths(), 1);
        assert!(!guard.can_navigate(PATH));
    }

    #[test]
    fn paths_are_tracked_independently() {
        let (guard, _clock) = guard();
        for _ in 0..6 {
            guard.can_navigate("/login");
        }

        assert!(guard.is_blocked("/login"));
        assert!(guard.can_navigate("/admin-dashboard"));
    }

    #[test]
    fn sweep_drops_only_stale_records() {
        let (guard, clock) = guard();
        guard.can_navigate("/old");
        clock.advance_ms(2_000);
        guard.can_navigate("/fresh");
        clock.advance_ms(1_500);

        assert_eq!(guard.sweep(), 1);
        assert!(guard.attempt("/old").is_none());
        assert!(guard.attempt("/fresh").is_some());
    }
}
