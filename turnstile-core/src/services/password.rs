use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    Error, User,
    credentials::CredentialStore,
    crypto,
    error::AuthError,
    repositories::UserRepository,
    user::NewUser,
    validation::{validate_password, validate_password_confirmation, validate_username},
};

/// Service for password registration and verification
///
/// This is the credential store the login guard delegates to. It never
/// rate-limits on its own.
pub struct PasswordService<U: UserRepository> {
    user_repository: Arc<U>,
}

impl<U: UserRepository> PasswordService<U> {
    /// Create a new PasswordService with the given repository
    pub fn new(user_repository: Arc<U>) -> Self {
        Self { user_repository }
    }

    /// Register a new user with a password
    ///
    /// Fails with [`AuthError::UserAlreadyExists`] if the username is taken;
    /// an existing user's password is never overwritten here.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<User, Error> {
        validate_username(username)?;
        validate_password(password)?;
        validate_password_confirmation(password, confirm_password)?;

        if self
            .user_repository
            .find_by_username(username)
            .await?
            .is_some()
        {
            return Err(AuthError::UserAlreadyExists.into());
        }

        let password_hash = crypto::hash_password(password);
        let user = self
            .user_repository
            .create(NewUser::new(username)?, &password_hash)
            .await?;

        tracing::info!(username = %user.username, user_id = %user.id, "Registered user");
        Ok(user)
    }

    /// Change a user's password after checking the current one
    pub async fn change_password(
        &self,
        username: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), Error> {
        validate_password(new_password)?;

        if !self.check(username, old_password).await? {
            return Err(AuthError::InvalidCredentials.into());
        }

        let password_hash = crypto::hash_password(new_password);
        self.user_repository
            .set_password_hash(username, &password_hash)
            .await?;

        tracing::info!(username = %username, "Password changed");
        Ok(())
    }

    /// Look up a user by username
    pub async fn get_user(&self, username: &str) -> Result<Option<User>, Error> {
        self.user_repository.find_by_username(username).await
    }

    async fn check(&self, username: &str, password: &str) -> Result<bool, Error> {
        let Some(hash) = self.user_repository.get_password_hash(username).await? else {
            return Ok(false);
        };
        Ok(crypto::verify_password(password, &hash)?)
    }
}

#[async_trait]
impl<U: UserRepository> CredentialStore for PasswordService<U> {
    async fn verify(&self, username: &str, password: &str) -> Result<bool, Error> {
        self.check(username, password).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ValidationError,
        repositories::InMemoryUserRepository,
    };

    fn service() -> PasswordService<InMemoryUserRepository> {
        PasswordService::new(Arc::new(InMemoryUserRepository::new()))
    }

    #[tokio::test]
    async fn test_register_and_verify() {
        let service = service();
        let user = service
            .register("alice", "correct-password", "correct-password")
            .await
            .unwrap();

        assert_eq!(user.username, "alice");
        assert!(user.id.is_valid());
        assert!(service.verify("alice", "correct-password").await.unwrap());
        assert!(!service.verify("alice", "wrong-password").await.unwrap());
    }

    #[tokio::test]
    async fn test_password_is_stored_hashed() {
        let repo = Arc::new(InMemoryUserRepository::new());
        let service = PasswordService::new(repo.clone());
        service
            .register("alice", "correct-password", "correct-password")
            .await
            .unwrap();

        let hash = repo.get_password_hash("alice").await.unwrap().unwrap();
        assert_ne!(hash, "correct-password");
        assert!(hash.starts_with("$argon2"));
    }

    #[tokio::test]
    async fn test_unknown_user_does_not_match() {
        let service = service();
        assert!(!service.verify("nobody", "whatever-password").await.unwrap());
    }

    #[tokio::test]
    async fn test_register_rejects_taken_username() {
        let service = service();
        service
            .register("alice", "correct-password", "correct-password")
            .await
            .unwrap();

        let result = service
            .register("alice", "another-password", "another-password")
            .await;
        assert!(matches!(result, Err(Error::Auth(AuthError::UserAlreadyExists))));

        // Original password still works
        assert!(service.verify("alice", "correct-password").await.unwrap());
    }

    #[tokio::test]
    async fn test_register_validates_input() {
        let service = service();

        assert!(matches!(
            service.register("", "correct-password", "correct-password").await,
            Err(Error::Validation(ValidationError::MissingField(_)))
        ));
        assert!(matches!(
            service.register("al ice", "correct-password", "correct-password").await,
            Err(Error::Validation(ValidationError::InvalidUsername(_)))
        ));
        assert!(matches!(
            service.register("alice", "short", "short").await,
            Err(Error::Validation(ValidationError::WeakPassword))
        ));
        assert!(matches!(
            service.register("alice", "correct-password", "other-password").await,
            Err(Error::Auth(AuthError::PasswordMismatch))
        ));
        assert!(service.get_user("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_change_password() {
        let service = service();
        service
            .register("alice", "correct-password", "correct-password")
            .await
            .unwrap();

        let result = service
            .change_password("alice", "wrong-password", "brand-new-password")
            .await;
        assert!(matches!(result, Err(Error::Auth(AuthError::InvalidCredentials))));

        service
            .change_password("alice", "correct-password", "brand-new-password")
            .await
            .unwrap();
        assert!(!service.verify("alice", "correct-password").await.unwrap());
        assert!(service.verify("alice", "brand-new-password").await.unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_hash_is_an_error() {
        let repo = Arc::new(InMemoryUserRepository::new());
        repo.create(NewUser::new("alice").unwrap(), "not-a-phc-string")
            .await
            .unwrap();
        let service = PasswordService::new(repo);

        let result = service.verify("alice", "correct-password").await;
        assert!(matches!(result, Err(Error::Crypto(_))));
    }
}
