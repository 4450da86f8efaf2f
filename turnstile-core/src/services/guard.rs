//! Login guard: sliding-window brute force protection per username.
//!
//! Every login goes through [`LoginGuard::attempt`], which checks for an
//! active lock, verifies the credentials, and escalates to a temporary lock
//! when too many failures land inside one of two sliding windows.
//!
//! # Escalation
//!
//! With the default [`LoginGuardConfig`]:
//!
//! - 3 failures within 2 hours lock the account for 2 hours
//! - 5 failures within 24 hours lock the account for 24 hours
//!
//! The short window is checked first. Locking clears the attempt log, so an
//! account that reoffends after a lock starts counting from zero. A
//! successful login clears the log and any lock.
//!
//! # Expiry
//!
//! Locks expire lazily: a lock whose `locked_until` is not after `now` is
//! ignored by every read. The background task from
//! [`LoginGuard::start_cleanup_task`] only reclaims storage.
//!
//! # Example
//!
//! ```rust,ignore
//! use turnstile_core::services::{LoginGuard, LoginOutcome};
//! use turnstile_core::LoginGuardConfig;
//!
//! let guard = LoginGuard::new(attempts, credentials, LoginGuardConfig::default())?;
//!
//! match guard.attempt("alice", "hunter22", Utc::now()).await {
//!     LoginOutcome::Success => { /* issue a session */ }
//!     LoginOutcome::Rejected => { /* 401 */ }
//!     LoginOutcome::Locked { retry_after, .. } => { /* 403 with Retry-After */ }
//!     LoginOutcome::Error(e) => { /* 503, retry later */ }
//! }
//! ```

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::{
    Error,
    clock::{Clock, SystemClock, truncate_to_millis},
    config::LoginGuardConfig,
    credentials::CredentialStore,
    error::ValidationError,
    repositories::LoginAttemptRepository,
    storage::{AccountState, AttemptRecord, CleanupStats, LockState, LockTier},
};

/// Result of a login attempt.
#[derive(Debug)]
pub enum LoginOutcome {
    /// Credentials matched; history and lock were cleared
    Success,
    /// Credentials did not match and no threshold was reached
    Rejected,
    /// The account is locked, either already or as a result of this attempt
    Locked {
        retry_after: Duration,
        locked_until: DateTime<Utc>,
        tier: LockTier,
    },
    /// A dependency failed; no guard state was changed
    Error(Error),
}

impl LoginOutcome {
    fn locked(lock: &LockState, now: DateTime<Utc>) -> Self {
        LoginOutcome::Locked {
            retry_after: lock.locked_until - now,
            locked_until: lock.locked_until,
            tier: lock.tier,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, LoginOutcome::Success)
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, LoginOutcome::Rejected)
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, LoginOutcome::Locked { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, LoginOutcome::Error(_))
    }

    /// Seconds until the lock lapses, rounded up, for `Retry-After` headers.
    pub fn retry_after_seconds(&self) -> Option<i64> {
        match self {
            LoginOutcome::Locked { retry_after, .. } => {
                let millis = retry_after.num_milliseconds();
                Some((millis + 999) / 1000)
            }
            _ => None,
        }
    }
}

struct GuardInner<R: LoginAttemptRepository, C: CredentialStore> {
    repository: Arc<R>,
    credentials: Arc<C>,
    config: LoginGuardConfig,
    account_locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Service that rate-limits login attempts per username.
///
/// # Thread Safety
///
/// Attempts for the same username are serialized; attempts for different
/// usernames run in parallel. Cloning the guard is cheap and clones share
/// all state.
pub struct LoginGuard<R: LoginAttemptRepository, C: CredentialStore> {
    inner: Arc<GuardInner<R, C>>,
    clock: Arc<dyn Clock>,
}

impl<R: LoginAttemptRepository, C: CredentialStore> Clone for LoginGuard<R, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<R: LoginAttemptRepository, C: CredentialStore> LoginGuard<R, C> {
    /// Create a new LoginGuard.
    ///
    /// # Arguments
    ///
    /// * `repository` - Storage for the attempt log and locks
    /// * `credentials` - The credential check being guarded
    /// * `config` - Window sizes, thresholds and lock durations
    pub fn new(
        repository: Arc<R>,
        credentials: Arc<C>,
        config: LoginGuardConfig,
    ) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(GuardInner {
                repository,
                credentials,
                config,
                account_locks: DashMap::new(),
            }),
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the clock used by [`attempt_now`](Self::attempt_now) and the cleanup task.
    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn config(&self) -> &LoginGuardConfig {
        &self.inner.config
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.config.enabled
    }

    /// Evaluate one login attempt at the instant `now`.
    ///
    /// The attempt runs in its own task: once started it completes even if
    /// the returned future is dropped, so a cancelled caller can never leave
    /// the attempt log half-updated.
    ///
    /// `now` is truncated to whole milliseconds before use.
    pub async fn attempt(&self, username: &str, password: &str, now: DateTime<Utc>) -> LoginOutcome {
        let now = truncate_to_millis(now);
        if username.is_empty() {
            return LoginOutcome::Error(
                ValidationError::MissingField("Username is required".to_string()).into(),
            );
        }

        let inner = Arc::clone(&self.inner);
        let username = username.to_string();
        let password = password.to_string();

        let task = tokio::spawn(async move { inner.attempt(&username, &password, now).await });

        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Login attempt task failed");
                LoginOutcome::Error(Error::Internal(format!("login attempt task failed: {e}")))
            }
        }
    }

    /// Evaluate one login attempt at the guard clock's current instant.
    pub async fn attempt_now(&self, username: &str, password: &str) -> LoginOutcome {
        let now = self.clock.now();
        self.attempt(username, password, now).await
    }

    /// The lock in force for a username at `now`, ignoring expired locks.
    pub async fn lock_status(
        &self,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<LockState>, Error> {
        self.inner
            .active_lock(username, truncate_to_millis(now))
            .await
    }

    /// Current state of an account as seen at `now`.
    pub async fn account_state(
        &self,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<AccountState, Error> {
        let now = truncate_to_millis(now);
        if let Some(lock) = self.inner.active_lock(username, now).await? {
            return Ok(AccountState::Locked {
                tier: lock.tier,
                locked_until: lock.locked_until,
            });
        }

        let config = &self.inner.config;
        let widest = config.short_window.window.max(config.long_window.window);
        let failures = self
            .inner
            .repository
            .count_failures_since(username, now - widest)
            .await?;

        Ok(if failures == 0 {
            AccountState::Clear
        } else {
            AccountState::Warned { failures }
        })
    }

    /// Unlock an account and forget its failure history.
    ///
    /// # Returns
    ///
    /// `true` if a lock was in force at `now`.
    pub async fn unlock_account(&self, username: &str, now: DateTime<Utc>) -> Result<bool, Error> {
        let now = truncate_to_millis(now);
        let account_lock = self.inner.account_lock(username);
        let result = {
            let _serialized = account_lock.lock().await;
            self.inner.unlock(username, now).await
        };
        self.inner.release(username, &account_lock);

        let was_locked = result?;
        if was_locked {
            tracing::info!(username = %username, "Account unlocked");
        }
        Ok(was_locked)
    }

    /// Delete lapsed locks and attempts older than the retention period.
    pub async fn prune(&self, now: DateTime<Utc>) -> Result<CleanupStats, Error> {
        self.inner.prune(now).await
    }

    /// Start the background cleanup task.
    ///
    /// The task runs [`prune`](Self::prune) every `cleanup_interval` until the
    /// shutdown channel changes.
    pub fn start_cleanup_task(
        &self,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let clock = Arc::clone(&self.clock);
        let interval = inner.config.cleanup_interval;

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        match inner.prune(clock.now()).await {
                            Ok(stats) if stats.total() > 0 => {
                                tracing::info!(
                                    expired_locks = stats.expired_locks_removed,
                                    old_attempts = stats.old_attempts_removed,
                                    "Pruned login guard state"
                                );
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "Failed to prune login guard state");
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown.changed() => {
                        tracing::info!("Shutting down login guard cleanup task");
                        break;
                    }
                }
            }
        })
    }
}

impl<R: LoginAttemptRepository, C: CredentialStore> GuardInner<R, C> {
    fn account_lock(&self, username: &str) -> Arc<Mutex<()>> {
        Arc::clone(&self.account_locks.entry(username.to_string()).or_default())
    }

    /// Drop the map entry for `username` once only the map and the caller
    /// hold it. Cloning an entry takes the same shard lock, so a waiter
    /// that arrives concurrently keeps the entry alive.
    fn release(&self, username: &str, account_lock: &Arc<Mutex<()>>) {
        self.account_locks.remove_if(username, |_, entry| {
            Arc::ptr_eq(entry, account_lock) && Arc::strong_count(entry) == 2
        });
    }

    async fn unlock(&self, username: &str, now: DateTime<Utc>) -> Result<bool, Error> {
        let was_locked = self.active_lock(username, now).await?.is_some();
        self.repository.clear_account(username).await?;
        Ok(was_locked)
    }

    async fn active_lock(
        &self,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<LockState>, Error> {
        Ok(self
            .repository
            .find_lock(username)
            .await?
            .filter(|lock| lock.is_active(now)))
    }

    async fn attempt(&self, username: &str, password: &str, now: DateTime<Utc>) -> LoginOutcome {
        let account_lock = self.account_lock(username);
        let result = {
            let _serialized = account_lock.lock().await;
            self.evaluate(username, password, now).await
        };
        self.release(username, &account_lock);

        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(
                    username = %username,
                    error = %e,
                    "Login attempt could not be evaluated"
                );
                LoginOutcome::Error(e)
            }
        }
    }

    /// Decide one attempt. Every storage read happens before the single
    /// write, so an error leaves the account untouched.
    async fn evaluate(
        &self,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<LoginOutcome, Error> {
        if !self.config.enabled {
            let matched = self.credentials.verify(username, password).await?;
            return Ok(if matched {
                LoginOutcome::Success
            } else {
                LoginOutcome::Rejected
            });
        }

        if let Some(lock) = self.active_lock(username, now).await? {
            tracing::debug!(
                username = %username,
                locked_until = %lock.locked_until,
                "Login attempt on locked account"
            );
            return Ok(LoginOutcome::locked(&lock, now));
        }

        if self.credentials.verify(username, password).await? {
            // The success record would be deleted by the same reset, so the
            // reset alone is written.
            self.repository.clear_account(username).await?;
            return Ok(LoginOutcome::Success);
        }

        let short = &self.config.short_window;
        let long = &self.config.long_window;

        // +1 for the failure being evaluated; it counts toward both windows.
        let short_failures = self
            .repository
            .count_failures_since(username, now - short.window)
            .await?
            + 1;
        let long_failures = self
            .repository
            .count_failures_since(username, now - long.window)
            .await?
            + 1;

        let escalation = if short_failures >= short.max_failures {
            Some((LockTier::Short, short.lockout))
        } else if long_failures >= long.max_failures {
            Some((LockTier::Long, long.lockout))
        } else {
            None
        };

        match escalation {
            Some((tier, lockout)) => {
                let lock = LockState::new(username, tier, now, lockout);
                self.repository.lock_account(&lock).await?;

                tracing::info!(
                    username = %username,
                    tier = %tier,
                    short_failures,
                    long_failures,
                    locked_until = %lock.locked_until,
                    "Account locked after repeated failed logins"
                );
                Ok(LoginOutcome::locked(&lock, now))
            }
            None => {
                self.repository
                    .record_attempt(&AttemptRecord::failure(username, now))
                    .await?;

                tracing::debug!(
                    username = %username,
                    short_failures,
                    long_failures,
                    "Rejected login attempt"
                );
                Ok(LoginOutcome::Rejected)
            }
        }
    }

    async fn prune(&self, now: DateTime<Utc>) -> Result<CleanupStats, Error> {
        let now = truncate_to_millis(now);
        let stats = self
            .repository
            .cleanup(now - self.config.retention_period, now)
            .await?;

        // Only entries nobody is holding or waiting on.
        self.account_locks
            .retain(|_, lock| Arc::strong_count(lock) > 1);

        Ok(stats)
    }
}
