//! Versioned schema migrations
//!
//! Backends implement [`Migration`] once per schema change and a
//! [`MigrationManager`] that records applied versions in a tracking table.

use async_trait::async_trait;
use sqlx::Database;
use thiserror::Error;
use turnstile_core::error::StorageError;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Migration failed: {0}")]
    Migration(String),
    #[error("Duplicate migration version {0}")]
    DuplicateVersion(i64),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<MigrationError> for turnstile_core::Error {
    fn from(error: MigrationError) -> Self {
        tracing::error!(error = %error, "Migration error");
        turnstile_core::Error::Storage(StorageError::Migration(error.to_string()))
    }
}

pub type Result<T> = std::result::Result<T, MigrationError>;

#[async_trait]
pub trait Migration<DB: Database>: Send + Sync {
    /// Execute the migration
    async fn up<'a>(&'a self, conn: &'a mut <DB as Database>::Connection) -> Result<()>;

    /// Rollback the migration
    async fn down<'a>(&'a self, conn: &'a mut <DB as Database>::Connection) -> Result<()>;

    /// Unique version number for ordering migrations
    fn version(&self) -> i64;

    /// Human readable name of the migration
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    /// Milliseconds since the unix epoch
    pub applied_at: i64,
}

impl MigrationRecord {
    pub fn applied_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp_millis(self.applied_at)
    }
}

/// Check that versions are unique and return the migrations in ascending
/// version order.
pub fn ordered<DB: Database>(
    migrations: &[Box<dyn Migration<DB>>],
) -> Result<Vec<&dyn Migration<DB>>> {
    let mut ordered: Vec<&dyn Migration<DB>> = migrations.iter().map(|m| m.as_ref()).collect();
    ordered.sort_by_key(|m| m.version());

    if let Some(pair) = ordered.windows(2).find(|w| w[0].version() == w[1].version()) {
        return Err(MigrationError::DuplicateVersion(pair[0].version()));
    }
    Ok(ordered)
}

#[async_trait]
pub trait MigrationManager<DB: Database>: Send + Sync {
    fn get_migration_table_name(&self) -> &str {
        "_turnstile_migrations"
    }

    /// Initialize migration tracking table
    async fn initialize(&self) -> Result<()>;

    /// Apply pending migrations in ascending version order
    async fn up(&self, migrations: &[Box<dyn Migration<DB>>]) -> Result<()>;

    /// Roll back applied migrations in descending version order
    async fn down(&self, migrations: &[Box<dyn Migration<DB>>]) -> Result<()>;

    /// Get list of applied migrations
    async fn get_applied_migrations(&self) -> Result<Vec<MigrationRecord>>;

    /// Check if specific migration was applied
    async fn is_applied(&self, version: i64) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Sqlite;

    struct Noop(i64);

    #[async_trait]
    impl Migration<Sqlite> for Noop {
        async fn up<'a>(&'a self, _conn: &'a mut sqlx::SqliteConnection) -> Result<()> {
            Ok(())
        }

        async fn down<'a>(&'a self, _conn: &'a mut sqlx::SqliteConnection) -> Result<()> {
            Ok(())
        }

        fn version(&self) -> i64 {
            self.0
        }

        fn name(&self) -> &str {
            "Noop"
        }
    }

    #[test]
    fn test_ordered_sorts_by_version() {
        let migrations: Vec<Box<dyn Migration<Sqlite>>> =
            vec![Box::new(Noop(3)), Box::new(Noop(1)), Box::new(Noop(2))];
        let versions: Vec<i64> = ordered(&migrations)
            .unwrap()
            .iter()
            .map(|m| m.version())
            .collect();
        assert_eq!(versions, vec![1, 2, 3]);
    }

    #[test]
    fn test_ordered_rejects_duplicates() {
        let migrations: Vec<Box<dyn Migration<Sqlite>>> =
            vec![Box::new(Noop(1)), Box::new(Noop(1))];
        assert!(matches!(
            ordered(&migrations),
            Err(MigrationError::DuplicateVersion(1))
        ));
    }

    #[test]
    fn test_migration_error_maps_to_storage_error() {
        let error: turnstile_core::Error = MigrationError::Migration("boom".to_string()).into();
        assert!(error.is_storage_error());
    }
}
