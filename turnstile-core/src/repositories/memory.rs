//! In-memory repositories backed by `DashMap`.
//!
//! Useful for tests and single-process deployments that do not need guard
//! state to survive a restart.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, mapref::entry::Entry};

use crate::{
    Error, User,
    error::{AuthError, StorageError},
    repositories::{
        LoginAttemptRepository, LoginAttemptRepositoryProvider, RepositoryProvider,
        UserRepository, UserRepositoryProvider,
    },
    storage::{AttemptRecord, CleanupStats, LockState},
    user::NewUser,
};

#[derive(Debug, Clone)]
struct StoredUser {
    user: User,
    password_hash: String,
}

#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    users: DashMap<String, StoredUser>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: NewUser, password_hash: &str) -> Result<User, Error> {
        match self.users.entry(user.username.clone()) {
            Entry::Occupied(_) => Err(AuthError::UserAlreadyExists.into()),
            Entry::Vacant(slot) => {
                let now = Utc::now();
                let user = User {
                    id: user.id,
                    username: user.username,
                    created_at: now,
                    updated_at: now,
                };
                slot.insert(StoredUser {
                    user: user.clone(),
                    password_hash: password_hash.to_string(),
                });
                Ok(user)
            }
        }
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, Error> {
        Ok(self.users.get(username).map(|stored| stored.user.clone()))
    }

    async fn get_password_hash(&self, username: &str) -> Result<Option<String>, Error> {
        Ok(self
            .users
            .get(username)
            .map(|stored| stored.password_hash.clone()))
    }

    async fn set_password_hash(&self, username: &str, hash: &str) -> Result<(), Error> {
        let mut stored = self
            .users
            .get_mut(username)
            .ok_or(Error::Storage(StorageError::NotFound))?;
        stored.password_hash = hash.to_string();
        stored.user.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, username: &str) -> Result<(), Error> {
        self.users
            .remove(username)
            .map(|_| ())
            .ok_or(Error::Storage(StorageError::NotFound))
    }
}

/// Attempt log and lock for one username, kept under one map entry so that
/// lock-and-clear is a single atomic update.
#[derive(Debug, Default)]
struct AccountRecord {
    attempts: Vec<AttemptRecord>,
    lock: Option<LockState>,
}

impl AccountRecord {
    fn is_empty(&self) -> bool {
        self.attempts.is_empty() && self.lock.is_none()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryLoginAttemptRepository {
    accounts: DashMap<String, AccountRecord>,
}

impl InMemoryLoginAttemptRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LoginAttemptRepository for InMemoryLoginAttemptRepository {
    async fn find_lock(&self, username: &str) -> Result<Option<LockState>, Error> {
        Ok(self
            .accounts
            .get(username)
            .and_then(|account| account.lock.clone()))
    }

    async fn count_failures_since(
        &self,
        username: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, Error> {
        let count = self.accounts.get(username).map_or(0, |account| {
            account
                .attempts
                .iter()
                .filter(|a| a.outcome.is_failure() && a.timestamp > since)
                .count()
        });
        Ok(count as u32)
    }

    async fn record_attempt(&self, attempt: &AttemptRecord) -> Result<(), Error> {
        self.accounts
            .entry(attempt.username.clone())
            .or_default()
            .attempts
            .push(attempt.clone());
        Ok(())
    }

    async fn lock_account(&self, lock: &LockState) -> Result<u64, Error> {
        let mut account = self.accounts.entry(lock.username.clone()).or_default();
        let cleared = account.attempts.len() as u64;
        account.attempts.clear();
        account.lock = Some(lock.clone());
        Ok(cleared)
    }

    async fn clear_account(&self, username: &str) -> Result<u64, Error> {
        Ok(self
            .accounts
            .remove(username)
            .map_or(0, |(_, account)| account.attempts.len() as u64))
    }

    async fn list_attempts(&self, username: &str) -> Result<Vec<AttemptRecord>, Error> {
        let mut attempts = self
            .accounts
            .get(username)
            .map(|account| account.attempts.clone())
            .unwrap_or_default();
        attempts.sort_by_key(|a| a.timestamp);
        Ok(attempts)
    }

    async fn list_locked(&self, now: DateTime<Utc>) -> Result<Vec<LockState>, Error> {
        Ok(self
            .accounts
            .iter()
            .filter_map(|account| account.lock.clone())
            .filter(|lock| lock.is_active(now))
            .collect())
    }

    async fn cleanup(
        &self,
        attempts_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<CleanupStats, Error> {
        let mut stats = CleanupStats::default();

        self.accounts.retain(|_, account| {
            let before = account.attempts.len();
            account.attempts.retain(|a| a.timestamp > attempts_before);
            stats.old_attempts_removed += (before - account.attempts.len()) as u64;

            if account.lock.as_ref().is_some_and(|lock| !lock.is_active(now)) {
                account.lock = None;
                stats.expired_locks_removed += 1;
            }

            !account.is_empty()
        });

        Ok(stats)
    }
}

/// Repository provider holding the in-memory repositories.
#[derive(Debug, Default)]
pub struct InMemoryRepositoryProvider {
    user: InMemoryUserRepository,
    login_attempt: InMemoryLoginAttemptRepository,
}

impl InMemoryRepositoryProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserRepositoryProvider for InMemoryRepositoryProvider {
    type UserRepo = InMemoryUserRepository;

    fn user(&self) -> &Self::UserRepo {
        &self.user
    }
}

impl LoginAttemptRepositoryProvider for InMemoryRepositoryProvider {
    type LoginAttemptRepo = InMemoryLoginAttemptRepository;

    fn login_attempt(&self) -> &Self::LoginAttemptRepo {
        &self.login_attempt
    }
}

#[async_trait]
impl RepositoryProvider for InMemoryRepositoryProvider {
    async fn migrate(&self) -> Result<(), Error> {
        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        Ok(())
    }
}
