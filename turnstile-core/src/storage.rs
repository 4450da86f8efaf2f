//! Records persisted by the login guard.
//!
//! The guard keeps two kinds of state per username: an append-only log of
//! [`AttemptRecord`]s and at most one [`LockState`]. Both are keyed by the raw,
//! case-sensitive username; there is no foreign key to the user table.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a single credential check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Failure,
}

impl AttemptOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, AttemptOutcome::Failure)
    }
}

/// One historical login attempt. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub username: String,
    pub timestamp: DateTime<Utc>,
    pub outcome: AttemptOutcome,
}

impl AttemptRecord {
    pub fn failure(username: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            username: username.into(),
            timestamp,
            outcome: AttemptOutcome::Failure,
        }
    }

    pub fn success(username: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            username: username.into(),
            timestamp,
            outcome: AttemptOutcome::Success,
        }
    }
}

/// Which escalation window produced a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockTier {
    Short,
    Long,
}

impl LockTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockTier::Short => "short",
            LockTier::Long => "long",
        }
    }
}

impl std::str::FromStr for LockTier {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "short" => Ok(LockTier::Short),
            "long" => Ok(LockTier::Long),
            other => Err(crate::error::StorageError::Database(format!(
                "unknown lock tier: {other}"
            ))
            .into()),
        }
    }
}

impl std::fmt::Display for LockTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A temporary lock on a username.
///
/// A lock whose `locked_until` is not after `now` is treated as absent by
/// every reader; nothing needs to delete it first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockState {
    pub username: String,
    pub locked_until: DateTime<Utc>,
    pub tier: LockTier,
    pub locked_at: DateTime<Utc>,
}

impl LockState {
    pub fn new(
        username: impl Into<String>,
        tier: LockTier,
        locked_at: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        Self {
            username: username.into(),
            locked_until: locked_at + duration,
            tier,
            locked_at,
        }
    }

    /// Whether the lock is still in force at `now` (`locked_until` is exclusive).
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.locked_until
    }

    /// Time left until the lock lapses, `None` once expired.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.is_active(now).then(|| self.locked_until - now)
    }
}

/// Observable per-account state of the guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AccountState {
    /// No active lock and no failures inside the long window
    Clear,
    /// Failures recorded, thresholds not reached
    Warned { failures: u32 },
    Locked {
        tier: LockTier,
        locked_until: DateTime<Utc>,
    },
}

/// Counts reported by a pruning pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupStats {
    pub expired_locks_removed: u64,
    pub old_attempts_removed: u64,
}

impl CleanupStats {
    pub fn total(&self) -> u64 {
        self.expired_locks_removed + self.old_attempts_removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_state_expiry_is_exclusive() {
        let t0 = Utc::now();
        let lock = LockState::new("alice", LockTier::Short, t0, Duration::hours(2));

        assert!(lock.is_active(t0));
        assert!(lock.is_active(t0 + Duration::minutes(119)));
        assert!(!lock.is_active(t0 + Duration::hours(2)));
        assert!(!lock.is_active(t0 + Duration::hours(3)));
    }

    #[test]
    fn test_lock_state_remaining() {
        let t0 = Utc::now();
        let lock = LockState::new("alice", LockTier::Long, t0, Duration::hours(24));

        assert_eq!(
            lock.remaining(t0 + Duration::hours(1)),
            Some(Duration::hours(23))
        );
        assert_eq!(lock.remaining(t0 + Duration::hours(24)), None);
    }

    #[test]
    fn test_lock_tier_round_trip_through_str() {
        assert_eq!("short".parse::<LockTier>().unwrap(), LockTier::Short);
        assert_eq!("long".parse::<LockTier>().unwrap(), LockTier::Long);
        assert!("medium".parse::<LockTier>().is_err());
        assert_eq!(LockTier::Long.to_string(), "long");
    }
}
