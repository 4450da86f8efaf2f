//! User accounts owned by the credential store
//!
//! | Field        | Type       | Description                                  |
//! | ------------ | ---------- | -------------------------------------------- |
//! | `id`         | `UserId`   | Opaque identifier, `usr_` prefixed.          |
//! | `username`   | `String`   | Case-sensitive login name, unique.           |
//! | `created_at` | `DateTime` | The timestamp when the user was created.     |
//! | `updated_at` | `DateTime` | The timestamp when the user was last updated. |
//!
//! Password hashes live next to the user record in storage but are never part
//! of [`User`].
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    id::{generate_prefixed_id, validate_prefixed_id},
};

/// A unique, stable identifier for a specific user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: &str) -> Self {
        UserId(id.to_string())
    }

    pub fn new_random() -> Result<Self, Error> {
        Ok(UserId(generate_prefixed_id("usr")?))
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate that this ID has the correct format for a user ID
    pub fn is_valid(&self) -> bool {
        validate_prefixed_id(&self.0, "usr")
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user that has not been persisted yet
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: UserId,
    pub username: String,
}

impl NewUser {
    pub fn new(username: impl Into<String>) -> Result<Self, Error> {
        Ok(Self {
            id: UserId::new_random()?,
            username: username.into(),
        })
    }

    pub fn with_id(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_gets_valid_id() {
        let user = NewUser::new("alice").unwrap();
        assert!(user.id.is_valid());
        assert_eq!(user.username, "alice");
    }

    #[test]
    fn test_user_id_display() {
        let id = UserId::new("usr_abc");
        assert_eq!(id.to_string(), "usr_abc");
        assert_eq!(id.as_str(), "usr_abc");
        assert_eq!(id.into_inner(), "usr_abc".to_string());
    }
}
