//! Crash-loop damping for supervisor restarts.
//!
//! Per-container restart windows live only in daemon memory; a daemon
//! restart resets all back-off state.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A container may restart at most this many times inside the burst window.
const BURST_LIMIT: u32 = 3;

/// Window within which repeated restarts count as a crash loop.
const BURST_WINDOW: Duration = Duration::from_secs(10);

/// Quiet time after which a container's restart count resets.
const COOL_OFF: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
struct RestartWindow {
    last_restart: Instant,
    count: u32,
}

/// Mutex-guarded per-container restart accounting.
#[derive(Debug, Default)]
pub struct RestartPolicy {
    windows: Mutex<HashMap<String, RestartWindow>>,
}

impl RestartPolicy {
    /// Creates an empty policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decides whether a container may restart now.
    #[must_use]
    pub fn admit(&self, name: &str) -> bool {
        self.admit_at(name, Instant::now())
    }

    /// Decision with an injected clock, for tests and the tick loop.
    ///
    /// A count that has been quiet longer than the cool-off resets; the
    /// incremented count is then held against the burst window. A refused
    /// restart does not refresh the window, so the cool-off is measured
    /// from the last restart that actually happened.
    pub fn admit_at(&self, name: &str, now: Instant) -> bool {
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let Some(window) = windows.get_mut(name) else {
            windows.insert(
                name.to_owned(),
                RestartWindow {
                    last_restart: now,
                    count: 1,
                },
            );
            return true;
        };

        let since_last = now.duration_since(window.last_restart);
        if since_last > COOL_OFF {
            window.count = 0;
        }
        window.count += 1;
        if since_last < BURST_WINDOW && window.count >= BURST_LIMIT {
            return false;
        }
        window.last_restart = now;
        true
    }

    /// Drops accounting for a container, e.g. after deletion.
    pub fn forget(&self, name: &str) {
        self.windows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_restart_is_always_admitted() {
        let policy = RestartPolicy::new();
        assert!(policy.admit_at("c", Instant::now()));
    }

    #[test]
    fn fast_crash_loop_is_damped() {
        let policy = RestartPolicy::new();
        let t0 = Instant::now();

        assert!(policy.admit_at("c", t0));
        assert!(policy.admit_at("c", t0 + Duration::from_secs(5)));
        // third attempt inside the burst window is refused
        assert!(!policy.admit_at("c", t0 + Duration::from_secs(9)));
    }

    #[test]
    fn no_container_restarts_more_than_three_times_per_ten_seconds() {
        let policy = RestartPolicy::new();
        let t0 = Instant::now();

        let mut admitted = Vec::new();
        // one attempt per supervisor tick over 30 seconds
        for tick in 0..6u64 {
            let now = t0 + Duration::from_secs(tick * 5);
            if policy.admit_at("c", now) {
                admitted.push(tick * 5);
            }
        }
        for window_start in 0..=20u64 {
            let in_window = admitted
                .iter()
                .filter(|t| **t >= window_start && **t < window_start + 10)
                .count();
            assert!(in_window <= 3, "{in_window} restarts in window at {window_start}s");
        }
    }

    #[test]
    fn cool_off_resets_the_count() {
        let policy = RestartPolicy::new();
        let t0 = Instant::now();

        assert!(policy.admit_at("c", t0));
        assert!(policy.admit_at("c", t0 + Duration::from_secs(5)));
        assert!(!policy.admit_at("c", t0 + Duration::from_secs(9)));

        // more than 60 s after the last granted restart
        assert!(policy.admit_at("c", t0 + Duration::from_secs(70)));
    }

    #[test]
    fn containers_are_damped_independently() {
        let policy = RestartPolicy::new();
        let t0 = Instant::now();

        assert!(policy.admit_at("a", t0));
        assert!(policy.admit_at("a", t0 + Duration::from_secs(2)));
        assert!(!policy.admit_at("a", t0 + Duration::from_secs(4)));

        assert!(policy.admit_at("b", t0 + Duration::from_secs(4)));
    }

    #[test]
    fn forget_clears_accounting() {
        let policy = RestartPolicy::new();
        let t0 = Instant::now();

        assert!(policy.admit_at("c", t0));
        assert!(policy.admit_at("c", t0 + Duration::from_secs(1)));
        assert!(!policy.admit_at("c", t0 + Duration::from_secs(2)));

        policy.forget("c");
        assert!(policy.admit_at("c", t0 + Duration::from_secs(3)));
    }
}
