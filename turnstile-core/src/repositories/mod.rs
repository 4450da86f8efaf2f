//! Repository traits for data access layer
//!
//! Services talk to storage only through these traits.
//!
//! # Trait Hierarchy
//!
//! - Individual `*Repository` traits define the operations for each data domain
//! - Individual `*RepositoryProvider` traits provide access to each repository type
//! - [`RepositoryProvider`] combines the provider traits with lifecycle methods

pub mod adapter;
pub mod login_attempt;
pub mod memory;
pub mod user;

pub use adapter::{LoginAttemptRepositoryAdapter, UserRepositoryAdapter};
pub use login_attempt::LoginAttemptRepository;
pub use memory::{
    InMemoryLoginAttemptRepository, InMemoryRepositoryProvider, InMemoryUserRepository,
};
pub use user::UserRepository;

use async_trait::async_trait;

use crate::Error;

/// Provider trait for user repository access.
pub trait UserRepositoryProvider: Send + Sync + 'static {
    /// The user repository implementation type
    type UserRepo: UserRepository;

    /// Get the user repository
    fn user(&self) -> &Self::UserRepo;
}

/// Provider trait for the login guard's attempt log and lock storage.
pub trait LoginAttemptRepositoryProvider: Send + Sync + 'static {
    /// The login attempt repository implementation type
    type LoginAttemptRepo: LoginAttemptRepository;

    /// Get the login attempt repository
    fn login_attempt(&self) -> &Self::LoginAttemptRepo;
}

/// Provider trait that storage implementations must implement to provide all repositories.
///
/// # Implementing a Custom Storage Backend
///
/// 1. Implement [`UserRepository`] and [`LoginAttemptRepository`] for your backend
/// 2. Implement the matching `*RepositoryProvider` traits
/// 3. Implement `RepositoryProvider` with `migrate()` and `health_check()`
///
/// # Example
///
/// ```rust,ignore
/// use turnstile_core::repositories::*;
///
/// struct MyStorage { /* ... */ }
///
/// impl UserRepositoryProvider for MyStorage {
///     type UserRepo = MyUserRepository;
///     fn user(&self) -> &Self::UserRepo { &self.user_repo }
/// }
///
/// #[async_trait]
/// impl RepositoryProvider for MyStorage {
///     async fn migrate(&self) -> Result<(), Error> { /* ... */ }
///     async fn health_check(&self) -> Result<(), Error> { /* ... */ }
/// }
/// ```
#[async_trait]
pub trait RepositoryProvider: UserRepositoryProvider + LoginAttemptRepositoryProvider {
    /// Run migrations for all repositories
    async fn migrate(&self) -> Result<(), Error>;

    /// Health check for all repositories
    async fn health_check(&self) -> Result<(), Error>;
}
