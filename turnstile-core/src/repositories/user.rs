use crate::{Error, User, user::NewUser};
use async_trait::async_trait;

/// Repository for user accounts and their password hashes
///
/// Lookups are by exact, case-sensitive username.
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Create a new user with its password hash
    ///
    /// Fails with `AuthError::UserAlreadyExists` if the username is taken.
    async fn create(&self, user: NewUser, password_hash: &str) -> Result<User, Error>;

    /// Find a user by username
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, Error>;

    /// Retrieve the stored password hash, `None` for unknown users
    async fn get_password_hash(&self, username: &str) -> Result<Option<String>, Error>;

    /// Replace the stored password hash
    async fn set_password_hash(&self, username: &str, hash: &str) -> Result<(), Error>;

    /// Delete a user by username
    async fn delete(&self, username: &str) -> Result<(), Error>;
}
