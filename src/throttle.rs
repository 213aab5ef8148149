//! Throttling of admin login attempts.
//!
//! Every client, keyed by its identity hash, is either allowed to try logging
//! in or blocked. Too many failures in a row block the client for a while;
//! a successful login clears its record.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};

use log::warn;

use crate::config::Config;
use crate::{Error, Result};

/// Failed logins of one client.
#[derive(Debug, Clone, Copy)]
struct Attempts {
    failures: u32,
    first_failure_at: DateTime<Utc>,
    blocked_at: Option<DateTime<Utc>>,
}

/// Per-client login throttling, shared by every request.
#[derive(Debug)]
pub struct LoginThrottle {
    max_failures: u32,
    block_duration: Duration,
    failure_window: Duration,
    attempts: Mutex<HashMap<String, Attempts>>,
}

impl LoginThrottle {
    pub fn new(max_failures: u32, block_duration: Duration, failure_window: Duration) -> LoginThrottle {
        LoginThrottle {
            max_failures: max_failures.max(1),
            block_duration,
            failure_window,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Make a throttle with the limits in a config.
    pub fn from_config(config: &Config) -> Result<LoginThrottle> {
        Ok(LoginThrottle::new(
            config.login_max_failures,
            config.login_block_duration.to_chrono()?,
            config.login_failure_window.to_chrono()?,
        ))
    }

    fn lock(&self) -> MutexGuard<HashMap<String, Attempts>> {
        // The map stays consistent even if a holder panicked.
        self.attempts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Check whether a client may try to log in at `now`.
    ///
    /// A block that has run out is cleared here.
    pub fn check(&self, key: &str, now: DateTime<Utc>) -> Result<()> {
        let mut attempts = self.lock();

        let blocked_at = match attempts.get(key).and_then(|entry| entry.blocked_at) {
            Some(blocked_at) => blocked_at,
            None => return Ok(()),
        };

        let unblocked_at = blocked_at + self.block_duration;

        if now >= unblocked_at {
            attempts.remove(key);
            return Ok(());
        }

        Err(Error::LoginBlocked {
            retry_after: (unblocked_at - now).num_seconds().max(1),
        })
    }

    /// Record a failed login. Returns whether the client is now blocked.
    ///
    /// Records that no longer matter to anyone are dropped here, so the map
    /// only holds clients with recent failures or a running block.
    pub fn record_failure(&self, key: &str, now: DateTime<Utc>) -> bool {
        let mut attempts = self.lock();

        let (block_duration, failure_window) = (self.block_duration, self.failure_window);
        attempts.retain(|_, entry| match entry.blocked_at {
            Some(blocked_at) => now < blocked_at + block_duration,
            None => now - entry.first_failure_at <= failure_window,
        });

        let entry = attempts.entry(key.to_string()).or_insert(Attempts {
            failures: 0,
            first_failure_at: now,
            blocked_at: None,
        });

        if entry.blocked_at.is_some() {
            return true;
        }

        if now - entry.first_failure_at > self.failure_window {
            entry.failures = 0;
            entry.first_failure_at = now;
        }

        entry.failures += 1;

        if entry.failures >= self.max_failures {
            warn!(
                "Blocking admin logins from {} after {} failures",
                key, entry.failures
            );
            entry.blocked_at = Some(now);
            return true;
        }

        false
    }

    /// Record a successful login, clearing the client's failures.
    pub fn record_success(&self, key: &str) {
        self.lock().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "client-hash";

    fn throttle() -> LoginThrottle {
        LoginThrottle::new(5, Duration::minutes(15), Duration::minutes(15))
    }

    #[test]
    fn blocks_after_max_failures() {
        let throttle = throttle();
        let now = Utc::now();

        for i in 0..4 {
            assert!(!throttle.record_failure(KEY, now + Duration::seconds(i)));
            assert!(throttle.check(KEY, now + Duration::seconds(i)).is_ok());
        }

        assert!(throttle.record_failure(KEY, now + Duration::seconds(4)));

        match throttle.check(KEY, now + Duration::seconds(5)) {
            Err(Error::LoginBlocked { retry_after }) => {
                assert!(retry_after > 0 && retry_after <= 15 * 60)
            }
            other => panic!("expected a block, got {:?}", other),
        }
    }

    #[test]
    fn block_lifts_after_duration() {
        let throttle = throttle();
        let now = Utc::now();

        for _ in 0..5 {
            throttle.record_failure(KEY, now);
        }

        assert!(throttle.check(KEY, now + Duration::minutes(14)).is_err());
        assert!(throttle.check(KEY, now + Duration::minutes(15)).is_ok());

        // A fresh start after the block.
        assert!(!throttle.record_failure(KEY, now + Duration::minutes(16)));
        assert!(throttle.check(KEY, now + Duration::minutes(16)).is_ok());
    }

    #[test]
    fn success_resets_the_count() {
        let throttle = throttle();
        let now = Utc::now();

        for _ in 0..4 {
            throttle.record_failure(KEY, now);
        }
        throttle.record_success(KEY);

        for _ in 0..4 {
            assert!(!throttle.record_failure(KEY, now));
        }
        assert!(throttle.check(KEY, now).is_ok());
    }

    #[test]
    fn old_failures_fall_out_of_the_window() {
        let throttle = throttle();
        let now = Utc::now();

        for _ in 0..4 {
            throttle.record_failure(KEY, now);
        }

        assert!(!throttle.record_failure(KEY, now + Duration::minutes(20)));
        assert!(throttle.check(KEY, now + Duration::minutes(20)).is_ok());
    }

    #[test]
    fn stale_records_are_dropped() {
        let throttle = throttle();
        let now = Utc::now();

        for i in 0..100 {
            throttle.record_failure(&format!("passerby-{}", i), now);
        }
        for _ in 0..5 {
            throttle.record_failure(KEY, now);
        }
        assert_eq!(throttle.lock().len(), 101);

        throttle.record_failure("latecomer", now + Duration::minutes(16));

        // The block on KEY is over too, so only the new record is left.
        assert_eq!(throttle.lock().len(), 1);
    }

    #[test]
    fn clients_are_throttled_separately() {
        let throttle = throttle();
        let now = Utc::now();

        for _ in 0..5 {
            throttle.record_failure(KEY, now);
        }

        assert!(throttle.check(KEY, now).is_err());
        assert!(throttle.check("someone-else", now).is_ok());
    }
}
