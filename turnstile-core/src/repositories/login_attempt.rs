//! Repository trait for the login guard's attempt log and lock state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error,
    storage::{AttemptRecord, CleanupStats, LockState},
};

/// Storage for the attempt log and per-username locks.
///
/// The guard serializes calls per username, so implementations only need
/// each individual method to be atomic. [`lock_account`] and
/// [`clear_account`] touch both the log and the lock and must apply as one
/// unit (a transaction for SQL backends).
///
/// Implementations return locks as stored, expired or not; callers decide
/// expiry against their own `now`.
///
/// [`lock_account`]: LoginAttemptRepository::lock_account
/// [`clear_account`]: LoginAttemptRepository::clear_account
#[async_trait]
pub trait LoginAttemptRepository: Send + Sync + 'static {
    /// Get the lock stored for a username, if any.
    async fn find_lock(&self, username: &str) -> Result<Option<LockState>, Error>;

    /// Count failed attempts for a username strictly after `since`.
    async fn count_failures_since(
        &self,
        username: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, Error>;

    /// Append an attempt to the log.
    async fn record_attempt(&self, attempt: &AttemptRecord) -> Result<(), Error>;

    /// Write (or overwrite) the lock and delete every attempt for its username.
    ///
    /// # Returns
    ///
    /// The number of attempt records deleted.
    async fn lock_account(&self, lock: &LockState) -> Result<u64, Error>;

    /// Delete every attempt and the lock for a username.
    ///
    /// # Returns
    ///
    /// The number of attempt records deleted.
    async fn clear_account(&self, username: &str) -> Result<u64, Error>;

    /// All attempts for a username, oldest first.
    async fn list_attempts(&self, username: &str) -> Result<Vec<AttemptRecord>, Error>;

    /// Locks still in force at `now`.
    async fn list_locked(&self, now: DateTime<Utc>) -> Result<Vec<LockState>, Error>;

    /// Delete attempts at or before `attempts_before` and locks that lapsed by `now`.
    async fn cleanup(
        &self,
        attempts_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<CleanupStats, Error>;
}
