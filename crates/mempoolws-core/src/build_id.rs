//! Server build tracking.
//!
//! The first build identifier seen is cached as the baseline and never
//! replaced. A later identifier that differs from the baseline asks for one
//! full client reload after a jittered delay, so that many clients connected
//! to the same server do not reload at the same instant.

use std::time::Duration;

use rand::Rng;

/// Watches the server's build identifier.
#[derive(Debug, Clone)]
pub struct BuildWatcher {
    baseline: Option<String>,
    reload_requested: bool,
    min_delay_ms: u64,
    jitter_ms: u64,
}

impl BuildWatcher {
    pub fn new(min_delay_ms: u64, jitter_ms: u64) -> Self {
        Self {
            baseline: None,
            reload_requested: false,
            min_delay_ms,
            jitter_ms,
        }
    }

    /// The cached baseline, if one was seen.
    pub fn baseline(&self) -> Option<&str> {
        self.baseline.as_deref()
    }

    /// Feed an observed identifier.
    ///
    /// Returns the reload delay the first time an identifier differs from
    /// the baseline; `None` otherwise.
    pub fn observe(&mut self, build: &str) -> Option<Duration> {
        let Some(baseline) = &self.baseline else {
            self.baseline = Some(build.to_string());
            return None;
        };
        if baseline == build || self.reload_requested {
            return None;
        }
        self.reload_requested = true;
        Some(self.reload_delay())
    }

    /// Uniform in `[min_delay_ms, min_delay_ms + jitter_ms)`.
    fn reload_delay(&self) -> Duration {
        let jitter = if self.jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..self.jitter_ms)
        };
        Duration::from_millis(self.min_delay_ms.saturating_add(jitter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_identifier_becomes_baseline() {
        let mut watcher = BuildWatcher::new(1_000, 60_000);
        assert!(watcher.observe("abc").is_none());
        assert_eq!(watcher.baseline(), Some("abc"));
    }

    #[test]
    fn same_identifier_never_reloads() {
        let mut watcher = BuildWatcher::new(1_000, 60_000);
        for _ in 0..10 {
            assert!(watcher.observe("abc").is_none());
        }
    }

    #[test]
    fn mismatch_reloads_once_within_window() {
        let mut watcher = BuildWatcher::new(1_000, 60_000);
        watcher.observe("abc");
        let delay = watcher.observe("def").expect("reload scheduled");
        assert!(delay >= Duration::from_millis(1_000));
        assert!(delay < Duration::from_millis(61_000));
        assert!(watcher.observe("ghi").is_none());
        assert!(watcher.observe("def").is_none());
    }

    #[test]
    fn baseline_is_frozen() {
        let mut watcher = BuildWatcher::new(1_000, 60_000);
        watcher.observe("abc");
        watcher.observe("def");
        assert_eq!(watcher.baseline(), Some("abc"));
    }

    #[test]
    fn zero_jitter_uses_min_delay() {
        let mut watcher = BuildWatcher::new(250, 0);
        watcher.observe("a");
        assert_eq!(watcher.observe("b"), Some(Duration::from_millis(250)));
    }

    #[test]
    fn huge_min_delay_saturates() {
        let mut watcher = BuildWatcher::new(u64::MAX, 60_000);
        watcher.observe("a");
        assert_eq!(watcher.observe("b"), Some(Duration::from_millis(u64::MAX)));
    }
}
