//! SQLite storage backend for turnstile
//!
//! Implements the repository traits from `turnstile_core::repositories` on
//! top of `sqlx`. Call [`RepositoryProvider::migrate`] once before use.
//!
//! ```rust,ignore
//! use turnstile_storage_sqlite::SqliteRepositoryProvider;
//!
//! let storage = SqliteRepositoryProvider::connect("sqlite://turnstile.db?mode=rwc").await?;
//! storage.migrate().await?;
//! ```
//!
//! [`RepositoryProvider::migrate`]: turnstile_core::repositories::RepositoryProvider::migrate

pub mod migrations;
pub mod repositories;

pub use repositories::{SqliteLoginAttemptRepository, SqliteRepositoryProvider, SqliteUserRepository};
