//! The credential check the login guard sits in front of.

use async_trait::async_trait;

use crate::Error;

/// Verifies a username/password pair.
///
/// `Ok(false)` means the credentials do not match (including unknown users).
/// `Err` means the check could not be performed; the guard never counts that
/// as a failed login.
#[async_trait]
pub trait CredentialStore: Send + Sync + 'static {
    async fn verify(&self, username: &str, password: &str) -> Result<bool, Error>;
}
