use crate::{
    Error, User,
    repositories::{LoginAttemptRepository, RepositoryProvider, UserRepository},
    storage::{AttemptRecord, CleanupStats, LockState},
    user::NewUser,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Adapter that wraps a RepositoryProvider and implements individual repository traits
pub struct UserRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> UserRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> UserRepository for UserRepositoryAdapter<R> {
    async fn create(&self, user: NewUser, password_hash: &str) -> Result<User, Error> {
        self.provider.user().create(user, password_hash).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, Error> {
        self.provider.user().find_by_username(username).await
    }

    async fn get_password_hash(&self, username: &str) -> Result<Option<String>, Error> {
        self.provider.user().get_password_hash(username).await
    }

    async fn set_password_hash(&self, username: &str, hash: &str) -> Result<(), Error> {
        self.provider.user().set_password_hash(username, hash).await
    }

    async fn delete(&self, username: &str) -> Result<(), Error> {
        self.provider.user().delete(username).await
    }
}

pub struct LoginAttemptRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> LoginAttemptRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> LoginAttemptRepository for LoginAttemptRepositoryAdapter<R> {
    async fn find_lock(&self, username: &str) -> Result<Option<LockState>, Error> {
        self.provider.login_attempt().find_lock(username).await
    }

    async fn count_failures_since(
        &self,
        username: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, Error> {
        self.provider
            .login_attempt()
            .count_failures_since(username, since)
            .await
    }

    async fn record_attempt(&self, attempt: &AttemptRecord) -> Result<(), Error> {
        self.provider.login_attempt().record_attempt(attempt).await
    }

    async fn lock_account(&self, lock: &LockState) -> Result<u64, Error> {
        self.provider.login_attempt().lock_account(lock).await
    }

    async fn clear_account(&self, username: &str) -> Result<u64, Error> {
        self.provider.login_attempt().clear_account(username).await
    }

    async fn list_attempts(&self, username: &str) -> Result<Vec<AttemptRecord>, Error> {
        self.provider.login_attempt().list_attempts(username).await
    }

    async fn list_locked(&self, now: DateTime<Utc>) -> Result<Vec<LockState>, Error> {
        self.provider.login_attempt().list_locked(now).await
    }

    async fn cleanup(
        &self,
        attempts_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<CleanupStats, Error> {
        self.provider
            .login_attempt()
            .cleanup(attempts_before, now)
            .await
    }
}
