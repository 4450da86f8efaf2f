//! Repository implementations for SQLite storage

pub mod login_attempt;
pub mod user;

pub use login_attempt::SqliteLoginAttemptRepository;
pub use user::SqliteUserRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use turnstile_core::{
    Error,
    error::StorageError,
    repositories::{LoginAttemptRepositoryProvider, RepositoryProvider, UserRepositoryProvider},
};
use turnstile_migration::MigrationManager;

use crate::migrations::{self, SqliteMigrationManager};

/// Stored timestamps are milliseconds since the unix epoch.
pub(crate) fn from_millis(millis: i64) -> Result<DateTime<Utc>, Error> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        Error::Storage(StorageError::Database(format!(
            "timestamp out of range: {millis}"
        )))
    })
}

/// Repository provider implementation for SQLite
///
/// This struct implements all the individual repository provider traits
/// as well as the unified `RepositoryProvider` trait.
pub struct SqliteRepositoryProvider {
    pool: SqlitePool,
    user: Arc<SqliteUserRepository>,
    login_attempt: Arc<SqliteLoginAttemptRepository>,
}

impl SqliteRepositoryProvider {
    pub fn new(pool: SqlitePool) -> Self {
        let user = Arc::new(SqliteUserRepository::new(pool.clone()));
        let login_attempt = Arc::new(SqliteLoginAttemptRepository::new(pool.clone()));

        Self {
            pool,
            user,
            login_attempt,
        }
    }

    /// Connect to a database URL such as `sqlite://turnstile.db?mode=rwc`.
    pub async fn connect(database_url: &str) -> Result<Self, Error> {
        let pool = SqlitePool::connect(database_url).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to database");
            Error::Storage(StorageError::Connection(e.to_string()))
        })?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl UserRepositoryProvider for SqliteRepositoryProvider {
    type UserRepo = SqliteUserRepository;

    fn user(&self) -> &Self::UserRepo {
        &self.user
    }
}

impl LoginAttemptRepositoryProvider for SqliteRepositoryProvider {
    type LoginAttemptRepo = SqliteLoginAttemptRepository;

    fn login_attempt(&self) -> &Self::LoginAttemptRepo {
        &self.login_attempt
    }
}

#[async_trait]
impl RepositoryProvider for SqliteRepositoryProvider {
    async fn migrate(&self) -> Result<(), Error> {
        let manager = SqliteMigrationManager::new(self.pool.clone());
        manager.initialize().await?;
        manager.up(&migrations::all()).await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turnstile_core::repositories::{LoginAttemptRepository, UserRepository};

    #[tokio::test]
    async fn test_provider_migrates_and_exposes_repositories() {
        let provider = SqliteRepositoryProvider::connect("sqlite::memory:")
            .await
            .unwrap();
        provider.migrate().await.unwrap();
        // Idempotent
        provider.migrate().await.unwrap();
        provider.health_check().await.unwrap();

        assert!(provider.user().find_by_username("alice").await.unwrap().is_none());
        assert!(provider.login_attempt().find_lock("alice").await.unwrap().is_none());
    }

    #[test]
    fn test_from_millis_rejects_out_of_range() {
        assert!(from_millis(0).is_ok());
        assert!(from_millis(i64::MAX).is_err());
    }
}
