//! # Turnstile
//!
//! Turnstile puts a brute-force guard in front of password logins. Failed
//! attempts are tracked per username in two sliding windows, and crossing
//! either threshold locks the account for a while:
//!
//! - 3 failures within 2 hours lock the account for 2 hours
//! - 5 failures within 24 hours lock the account for 24 hours
//!
//! A successful login clears the history. Locks expire on their own; no
//! background job is required, although one is available to reclaim storage.
//!
//! ## Storage Support
//!
//! - In-memory (always available)
//! - SQLite (`sqlite` feature, on by default)
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use turnstile::{LoginOutcome, SqliteRepositoryProvider, Turnstile};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), turnstile::TurnstileError> {
//!     let storage = Arc::new(SqliteRepositoryProvider::connect("sqlite::memory:").await?);
//!     let turnstile = Turnstile::new(storage)?;
//!     turnstile.migrate().await?;
//!
//!     turnstile.register_user("alice", "correct-horse", "correct-horse").await?;
//!
//!     match turnstile.login("alice", "correct-horse").await {
//!         LoginOutcome::Success => println!("welcome"),
//!         LoginOutcome::Locked { retry_after, .. } => println!("locked for {retry_after}"),
//!         other => println!("{other:?}"),
//!     }
//!     Ok(())
//! }
//! ```
use std::sync::Arc;

use chrono::{DateTime, Utc};
use turnstile_core::{
    Clock, SystemClock,
    clock::truncate_to_millis,
    repositories::{
        LoginAttemptRepository, LoginAttemptRepositoryAdapter, RepositoryProvider,
        UserRepositoryAdapter,
    },
};

/// Re-export core types from turnstile_core
///
/// These types are commonly used when working with the Turnstile API.
pub use turnstile_core::{
    AccountState, CleanupStats, LockState, LockTier, LockoutWindow, LoginGuardConfig,
    LoginOutcome, ManualClock, OtpConfig, User, UserId,
    repositories::InMemoryRepositoryProvider,
};

/// Re-export storage backends
///
/// These storage implementations are available when the corresponding feature is enabled.
#[cfg(feature = "sqlite")]
pub use turnstile_storage_sqlite::SqliteRepositoryProvider;

use turnstile_core::{LoginGuard, OtpService, PasswordService};

/// Errors that can occur when using Turnstile.
///
/// Failed logins are not errors; they are reported through [`LoginOutcome`].
#[derive(Debug, thiserror::Error)]
pub enum TurnstileError {
    /// Error during authentication
    #[error("Auth error: {0}")]
    AuthError(String),
    /// Input was rejected before reaching storage
    #[error("Validation error: {0}")]
    ValidationError(String),
    /// Error when interacting with storage
    #[error("Storage error: {0}")]
    StorageError(String),
    /// Invalid configuration
    #[error("Config error: {0}")]
    ConfigError(String),
}

impl From<turnstile_core::Error> for TurnstileError {
    fn from(error: turnstile_core::Error) -> Self {
        use turnstile_core::Error;

        match error {
            e @ Error::Config(_) => TurnstileError::ConfigError(e.to_string()),
            e if e.is_validation_error() => TurnstileError::ValidationError(e.to_string()),
            e @ Error::Auth(_) => TurnstileError::AuthError(e.to_string()),
            e => TurnstileError::StorageError(e.to_string()),
        }
    }
}

/// Configuration for a [`Turnstile`] instance.
#[derive(Debug, Clone, Default)]
pub struct TurnstileConfig {
    pub guard: LoginGuardConfig,
    pub otp: OtpConfig,
}

impl TurnstileConfig {
    pub fn with_guard(mut self, guard: LoginGuardConfig) -> Self {
        self.guard = guard;
        self
    }

    pub fn with_otp(mut self, otp: OtpConfig) -> Self {
        self.otp = otp;
        self
    }
}

type Credentials<R> = PasswordService<UserRepositoryAdapter<R>>;

/// The main coordinator: registration, guarded login, one-time codes and
/// account administration over one storage backend.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use turnstile::{InMemoryRepositoryProvider, Turnstile};
///
/// let turnstile = Turnstile::new(Arc::new(InMemoryRepositoryProvider::new())).unwrap();
/// assert!(turnstile.guard_config().enabled);
/// ```
pub struct Turnstile<R: RepositoryProvider> {
    repositories: Arc<R>,
    password_service: Arc<Credentials<R>>,
    guard: LoginGuard<LoginAttemptRepositoryAdapter<R>, Credentials<R>>,
    otp_service: OtpService,
    clock: Arc<dyn Clock>,
}

impl<R: RepositoryProvider> Turnstile<R> {
    /// Create a new Turnstile instance with the default configuration
    pub fn new(repositories: Arc<R>) -> Result<Self, TurnstileError> {
        Self::with_config(repositories, TurnstileConfig::default())
    }

    /// Create a new Turnstile instance
    ///
    /// # Arguments
    ///
    /// * `repositories` - The repository provider implementation
    /// * `config` - Guard and one-time code settings; rejected if invalid
    pub fn with_config(
        repositories: Arc<R>,
        config: TurnstileConfig,
    ) -> Result<Self, TurnstileError> {
        let password_service = Arc::new(PasswordService::new(Arc::new(
            UserRepositoryAdapter::new(repositories.clone()),
        )));
        let guard = LoginGuard::new(
            Arc::new(LoginAttemptRepositoryAdapter::new(repositories.clone())),
            password_service.clone(),
            config.guard,
        )?;
        let otp_service = OtpService::new(config.otp)?;

        Ok(Self {
            repositories,
            password_service,
            guard,
            otp_service,
            clock: Arc::new(SystemClock),
        })
    }

    /// Use a different clock for every time-dependent operation
    pub fn with_clock<C: Clock + Clone>(mut self, clock: C) -> Self {
        self.guard = self.guard.with_clock(clock.clone());
        self.clock = Arc::new(clock);
        self
    }

    pub fn guard_config(&self) -> &LoginGuardConfig {
        self.guard.config()
    }

    fn now(&self) -> DateTime<Utc> {
        truncate_to_millis(self.clock.now())
    }

    /// Run storage migrations
    pub async fn migrate(&self) -> Result<(), TurnstileError> {
        self.repositories.migrate().await?;
        Ok(())
    }

    /// Check that storage is reachable
    pub async fn health_check(&self) -> Result<(), TurnstileError> {
        self.repositories.health_check().await?;
        Ok(())
    }

    /// Register a user with a password
    ///
    /// # Arguments
    ///
    /// * `username`: The username to register
    /// * `password`: The password to set
    /// * `confirm_password`: Must equal `password`
    pub async fn register_user(
        &self,
        username: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<User, TurnstileError> {
        Ok(self
            .password_service
            .register(username, password, confirm_password)
            .await?)
    }

    pub async fn get_user(&self, username: &str) -> Result<Option<User>, TurnstileError> {
        Ok(self.password_service.get_user(username).await?)
    }

    /// Log a user in through the brute-force guard
    pub async fn login(&self, username: &str, password: &str) -> LoginOutcome {
        self.guard.attempt(username, password, self.now()).await
    }

    /// Log a user in through the brute-force guard at an explicit instant
    pub async fn login_at(
        &self,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> LoginOutcome {
        self.guard.attempt(username, password, now).await
    }

    /// Change a user's password
    ///
    /// The current password is checked through the guard, so a wrong one
    /// counts as a failed login and a locked account cannot change its
    /// password.
    pub async fn change_password(
        &self,
        username: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), TurnstileError> {
        match self.login(username, old_password).await {
            LoginOutcome::Success => {
                self.password_service
                    .change_password(username, old_password, new_password)
                    .await?;
                Ok(())
            }
            LoginOutcome::Error(e) => Err(e.into()),
            other => Err(TurnstileError::AuthError(format!(
                "current password not accepted: {other:?}"
            ))),
        }
    }

    /// Issue a one-time code for `username`
    pub fn generate_otp(&self, username: &str) -> Result<String, TurnstileError> {
        Ok(self.otp_service.generate(username, self.now())?)
    }

    /// Check and consume a one-time code
    pub fn verify_otp(&self, username: &str, code: &str) -> bool {
        self.otp_service.verify(username, code, self.now())
    }

    /// The lock in force for `username`, if any
    pub async fn lock_status(&self, username: &str) -> Result<Option<LockState>, TurnstileError> {
        Ok(self.guard.lock_status(username, self.now()).await?)
    }

    pub async fn account_state(&self, username: &str) -> Result<AccountState, TurnstileError> {
        Ok(self.guard.account_state(username, self.now()).await?)
    }

    /// Every account currently locked
    pub async fn locked_accounts(&self) -> Result<Vec<LockState>, TurnstileError> {
        Ok(self
            .repositories
            .login_attempt()
            .list_locked(self.now())
            .await?)
    }

    /// Lift a lock and forget the failure history
    ///
    /// # Returns
    ///
    /// `true` if the account was locked
    pub async fn unlock_account(&self, username: &str) -> Result<bool, TurnstileError> {
        Ok(self.guard.unlock_account(username, self.now()).await?)
    }

    /// Reclaim storage held by expired locks, old attempts and expired codes
    pub async fn prune(&self) -> Result<CleanupStats, TurnstileError> {
        let now = self.now();
        let stats = self.guard.prune(now).await?;
        let codes = self.otp_service.purge_expired(now);

        tracing::debug!(
            expired_locks = stats.expired_locks_removed,
            old_attempts = stats.old_attempts_removed,
            expired_codes = codes,
            "Pruned"
        );
        Ok(stats)
    }

    /// Start the guard's periodic cleanup task
    pub fn start_cleanup_task(
        &self,
        shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        self.guard.start_cleanup_task(shutdown)
    }
}
