//! SQLite implementation of the login attempt repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use turnstile_core::{
    Error,
    error::StorageError,
    repositories::LoginAttemptRepository,
    storage::{AttemptOutcome, AttemptRecord, CleanupStats, LockState, LockTier},
};

use super::from_millis;

/// SQLite repository for the attempt log and account locks.
pub struct SqliteLoginAttemptRepository {
    pool: SqlitePool,
}

impl SqliteLoginAttemptRepository {
    /// Create a new SQLite login attempt repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Internal struct for query results
#[derive(Debug, sqlx::FromRow)]
struct SqliteAttempt {
    username: String,
    attempted_at: i64,
    success: bool,
}

impl TryFrom<SqliteAttempt> for AttemptRecord {
    type Error = Error;

    fn try_from(row: SqliteAttempt) -> Result<Self, Self::Error> {
        Ok(AttemptRecord {
            username: row.username,
            timestamp: from_millis(row.attempted_at)?,
            outcome: if row.success {
                AttemptOutcome::Success
            } else {
                AttemptOutcome::Failure
            },
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SqliteLock {
    username: String,
    locked_until: i64,
    tier: String,
    locked_at: i64,
}

impl TryFrom<SqliteLock> for LockState {
    type Error = Error;

    fn try_from(row: SqliteLock) -> Result<Self, Self::Error> {
        Ok(LockState {
            username: row.username,
            locked_until: from_millis(row.locked_until)?,
            tier: row.tier.parse::<LockTier>()?,
            locked_at: from_millis(row.locked_at)?,
        })
    }
}

fn database_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> Error {
    move |e| {
        tracing::error!(error = %e, "{context}");
        Error::Storage(StorageError::Database(context.to_string()))
    }
}

#[async_trait]
impl LoginAttemptRepository for SqliteLoginAttemptRepository {
    async fn find_lock(&self, username: &str) -> Result<Option<LockState>, Error> {
        let row = sqlx::query_as::<_, SqliteLock>(
            "SELECT username, locked_until, tier, locked_at FROM locked_users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error("Failed to get account lock"))?;

        row.map(LockState::try_from).transpose()
    }

    async fn count_failures_since(
        &self,
        username: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, Error> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM login_attempts
            WHERE username = ? AND success = 0 AND attempted_at > ?
            "#,
        )
        .bind(username)
        .bind(since.timestamp_millis())
        .fetch_one(&self.pool)
        .await
        .map_err(database_error("Failed to count failed attempts"))?;

        Ok(count as u32)
    }

    async fn record_attempt(&self, attempt: &AttemptRecord) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO login_attempts (username, attempted_at, success) VALUES (?, ?, ?)",
        )
        .bind(&attempt.username)
        .bind(attempt.timestamp.timestamp_millis())
        .bind(!attempt.outcome.is_failure())
        .execute(&self.pool)
        .await
        .map_err(database_error("Failed to record login attempt"))?;

        Ok(())
    }

    async fn lock_account(&self, lock: &LockState) -> Result<u64, Error> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(database_error("Failed to begin transaction"))?;

        sqlx::query(
            r#"
            INSERT INTO locked_users (username, locked_until, tier, locked_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(username) DO UPDATE SET
                locked_until = excluded.locked_until,
                tier = excluded.tier,
                locked_at = excluded.locked_at
            "#,
        )
        .bind(&lock.username)
        .bind(lock.locked_until.timestamp_millis())
        .bind(lock.tier.as_str())
        .bind(lock.locked_at.timestamp_millis())
        .execute(&mut *tx)
        .await
        .map_err(database_error("Failed to lock account"))?;

        let cleared = sqlx::query("DELETE FROM login_attempts WHERE username = ?")
            .bind(&lock.username)
            .execute(&mut *tx)
            .await
            .map_err(database_error("Failed to clear attempts"))?
            .rows_affected();

        tx.commit()
            .await
            .map_err(database_error("Failed to commit account lock"))?;

        Ok(cleared)
    }

    async fn clear_account(&self, username: &str) -> Result<u64, Error> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(database_error("Failed to begin transaction"))?;

        let cleared = sqlx::query("DELETE FROM login_attempts WHERE username = ?")
            .bind(username)
            .execute(&mut *tx)
            .await
            .map_err(database_error("Failed to clear attempts"))?
            .rows_affected();

        sqlx::query("DELETE FROM locked_users WHERE username = ?")
            .bind(username)
            .execute(&mut *tx)
            .await
            .map_err(database_error("Failed to remove account lock"))?;

        tx.commit()
            .await
            .map_err(database_error("Failed to commit account reset"))?;

        Ok(cleared)
    }

    async fn list_attempts(&self, username: &str) -> Result<Vec<AttemptRecord>, Error> {
        let rows = sqlx::query_as::<_, SqliteAttempt>(
            r#"
            SELECT username, attempted_at, success
            FROM login_attempts
            WHERE username = ?
            ORDER BY attempted_at, id
            "#,
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await
        .map_err(database_error("Failed to list attempts"))?;

        rows.into_iter().map(AttemptRecord::try_from).collect()
    }

    async fn list_locked(&self, now: DateTime<Utc>) -> Result<Vec<LockState>, Error> {
        let rows = sqlx::query_as::<_, SqliteLock>(
            r#"
            SELECT username, locked_until, tier, locked_at
            FROM locked_users
            WHERE locked_until > ?
            ORDER BY locked_until
            "#,
        )
        .bind(now.timestamp_millis())
        .fetch_all(&self.pool)
        .await
        .map_err(database_error("Failed to list locked accounts"))?;

        rows.into_iter().map(LockState::try_from).collect()
    }

    async fn cleanup(
        &self,
        attempts_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<CleanupStats, Error> {
        let old_attempts_removed = sqlx::query("DELETE FROM login_attempts WHERE attempted_at <= ?")
            .bind(attempts_before.timestamp_millis())
            .execute(&self.pool)
            .await
            .map_err(database_error("Failed to remove old attempts"))?
            .rows_affected();

        let expired_locks_removed = sqlx::query("DELETE FROM locked_users WHERE locked_until <= ?")
            .bind(now.timestamp_millis())
            .execute(&self.pool)
            .await
            .map_err(database_error("Failed to remove expired locks"))?
            .rows_affected();

        Ok(CleanupStats {
            expired_locks_removed,
            old_attempts_removed,
        })
    }
}
