use crate::error::{AuthError, ValidationError};
use regex::Regex;
use std::sync::LazyLock;

/// Validation for registration and login input.
///
/// Usernames are case-sensitive and compared byte for byte everywhere, so
/// validation never normalises them.
static USERNAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\S+$").expect("Invalid username regex pattern"));

const MAX_USERNAME_LEN: usize = 64;

/// Validates a username
///
/// # Username Requirements
///
/// - Cannot be empty
/// - No whitespace anywhere
/// - Maximum 64 bytes
///
/// # Examples
///
/// ```rust
/// use turnstile_core::validation::validate_username;
///
/// assert!(validate_username("alice").is_ok());
/// assert!(validate_username("").is_err());
/// assert!(validate_username("al ice").is_err());
/// ```
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.is_empty() {
        return Err(ValidationError::MissingField(
            "Username is required".to_string(),
        ));
    }

    if username.len() > MAX_USERNAME_LEN {
        return Err(ValidationError::InvalidUsername(format!(
            "Username must be no more than {MAX_USERNAME_LEN} characters long"
        )));
    }

    if !USERNAME_REGEX.is_match(username) {
        return Err(ValidationError::InvalidUsername(
            "Username cannot contain whitespace".to_string(),
        ));
    }

    Ok(())
}

/// Validates a password according to security requirements
///
/// # Password Requirements
///
/// - Minimum 8 characters
/// - Maximum 128 characters
/// - Cannot be empty or whitespace only
///
/// # Examples
///
/// ```rust
/// use turnstile_core::validation::validate_password;
///
/// assert!(validate_password("securepassword123").is_ok());
/// assert!(validate_password("weak").is_err());
/// ```
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::MissingField(
            "Password is required".to_string(),
        ));
    }

    if password.trim().is_empty() {
        return Err(ValidationError::InvalidPassword(
            "Password cannot be only whitespace".to_string(),
        ));
    }

    if password.chars().count() < 8 {
        return Err(ValidationError::WeakPassword);
    }

    if password.chars().count() > 128 {
        return Err(ValidationError::InvalidPassword(
            "Password must be no more than 128 characters long".to_string(),
        ));
    }

    Ok(())
}

/// Checks that the confirmation typed at registration matches the password.
pub fn validate_password_confirmation(password: &str, confirm: &str) -> Result<(), AuthError> {
    if password != confirm {
        return Err(AuthError::PasswordMismatch);
    }
    Ok(())
}
