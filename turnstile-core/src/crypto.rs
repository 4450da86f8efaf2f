//! Cryptographic helpers for credentials and one-time codes
//!
//! Passwords are hashed with argon2 through `password-auth`, which produces a
//! salted PHC string. One-time codes are short-lived and stored as SHA256
//! digests so the code itself never sits in memory longer than needed; they
//! are compared in constant time via the `subtle` crate.

use password_auth::VerifyError;
use rand::{TryRngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::CryptoError;

/// Hash a password into a salted argon2 PHC string.
pub fn hash_password(password: &str) -> String {
    password_auth::generate_hash(password)
}

/// Check a password against a stored PHC string.
///
/// A mismatch is `Ok(false)`; only a hash that cannot be parsed is an error.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, CryptoError> {
    match password_auth::verify_password(password, stored_hash) {
        Ok(()) => Ok(true),
        Err(VerifyError::PasswordInvalid) => Ok(false),
        Err(e) => Err(CryptoError::PasswordHash(e.to_string())),
    }
}

/// Generate a 4-digit one-time code in `1000..=9999`.
pub fn generate_otp_code() -> Result<String, CryptoError> {
    let value = OsRng
        .try_next_u32()
        .map_err(|e| CryptoError::Random(e.to_string()))?;
    Ok((1000 + value % 9000).to_string())
}

/// Hex-encoded SHA256 of a token.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Verify a token against a stored hash with constant-time comparison.
pub fn verify_token_hash(token: &str, stored_hash: &str) -> bool {
    let computed_hash = hash_token(token);
    constant_time_compare(computed_hash.as_bytes(), stored_hash.as_bytes())
}

/// Constant-time equality of two byte slices.
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_is_salted() {
        let first = hash_password("correct horse");
        let second = hash_password("correct horse");

        assert_ne!(first, second);
        assert!(first.starts_with("$argon2"));
        assert!(verify_password("correct horse", &first).unwrap());
        assert!(verify_password("correct horse", &second).unwrap());
    }

    #[test]
    fn test_verify_password_mismatch_is_not_an_error() {
        let hash = hash_password("correct horse");
        assert!(!verify_password("battery staple", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_corrupt_hash_is_an_error() {
        assert!(verify_password("anything", "not-a-phc-string").is_err());
    }

    #[test]
    fn test_otp_code_range() {
        for _ in 0..200 {
            let code = generate_otp_code().unwrap();
            let value: u16 = code.parse().unwrap();
            assert!((1000..=9999).contains(&value));
            assert_eq!(code.len(), 4);
        }
    }

    #[test]
    fn test_hash_and_verify_token() {
        let hash = hash_token("4821");
        assert_eq!(hash.len(), 64);
        assert!(verify_token_hash("4821", &hash));
        assert!(!verify_token_hash("4822", &hash));
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare(b"hello", b"hello"));
        assert!(!constant_time_compare(b"hello", b"world"));
        assert!(!constant_time_compare(b"short", b"longer_string"));
        assert!(constant_time_compare(b"", b""));
    }
}
