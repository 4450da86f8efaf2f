//! Short-lived numeric one-time passwords.
//!
//! Codes are held per username in a concurrent map owned by the service.
//! Only the SHA256 digest of a code is stored.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::{
    Error,
    config::OtpConfig,
    crypto::{generate_otp_code, hash_token, verify_token_hash},
};

#[derive(Debug, Clone)]
struct PendingCode {
    code_hash: String,
    expires_at: DateTime<Utc>,
}

impl PendingCode {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Issues and checks single-use 4-digit codes with a TTL
#[derive(Debug)]
pub struct OtpService {
    codes: DashMap<String, PendingCode>,
    config: OtpConfig,
}

impl OtpService {
    pub fn new(config: OtpConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            codes: DashMap::new(),
            config,
        })
    }

    /// Issue a new code for `username`, replacing any code already pending.
    pub fn generate(&self, username: &str, now: DateTime<Utc>) -> Result<String, Error> {
        let code = generate_otp_code()?;
        self.codes.insert(
            username.to_string(),
            PendingCode {
                code_hash: hash_token(&code),
                expires_at: now + self.config.ttl,
            },
        );

        tracing::debug!(username = %username, "Issued one-time code");
        Ok(code)
    }

    /// Check a code and consume it on success.
    ///
    /// Expired codes are removed and never match. A wrong code leaves the
    /// pending code in place.
    pub fn verify(&self, username: &str, code: &str, now: DateTime<Utc>) -> bool {
        let matched = self
            .codes
            .remove_if(username, |_, pending| {
                pending.is_expired(now) || verify_token_hash(code, &pending.code_hash)
            })
            .is_some_and(|(_, pending)| !pending.is_expired(now));

        if !matched {
            tracing::debug!(username = %username, "One-time code rejected");
        }
        matched
    }

    /// Remove every expired code.
    ///
    /// # Returns
    ///
    /// The number of codes removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.codes.len();
        self.codes.retain(|_, pending| !pending.is_expired(now));
        before.saturating_sub(self.codes.len())
    }

    pub fn pending(&self) -> usize {
        self.codes.len()
    }
}

impl Default for OtpService {
    fn default() -> Self {
        Self {
            codes: DashMap::new(),
            config: OtpConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_generated_code_is_four_digits() {
        let service = OtpService::default();
        for _ in 0..50 {
            let code = service.generate("alice", Utc::now()).unwrap();
            let value: u32 = code.parse().unwrap();
            assert!((1000..=9999).contains(&value));
        }
    }

    #[test]
    fn test_code_is_single_use() {
        let service = OtpService::default();
        let now = Utc::now();
        let code = service.generate("alice", now).unwrap();

        assert!(service.verify("alice", &code, now + Duration::minutes(1)));
        assert!(!service.verify("alice", &code, now + Duration::minutes(1)));
    }

    #[test]
    fn test_wrong_code_keeps_pending_code() {
        let service = OtpService::default();
        let now = Utc::now();
        let code = service.generate("alice", now).unwrap();
        let wrong = if code == "1000" { "1001" } else { "1000" };

        assert!(!service.verify("alice", wrong, now));
        assert!(!service.verify("bob", &code, now));
        assert!(service.verify("alice", &code, now));
    }

    #[test]
    fn test_expired_code_fails_and_is_removed() {
        let service = OtpService::default();
        let now = Utc::now();
        let code = service.generate("alice", now).unwrap();

        assert!(!service.verify("alice", &code, now + Duration::minutes(5)));
        assert_eq!(service.pending(), 0);
    }

    #[test]
    fn test_new_code_replaces_old() {
        let service = OtpService::default();
        let now = Utc::now();

        let mut first = service.generate("alice", now).unwrap();
        let mut second = service.generate("alice", now).unwrap();
        while first == second {
            first = second;
            second = service.generate("alice", now).unwrap();
        }

        assert!(!service.verify("alice", &first, now));
        assert!(service.verify("alice", &second, now));
    }

    #[test]
    fn test_purge_expired() {
        let service = OtpService::new(OtpConfig {
            ttl: Duration::minutes(1),
        })
        .unwrap();
        let now = Utc::now();

        service.generate("alice", now - Duration::minutes(2)).unwrap();
        service.generate("bob", now).unwrap();

        assert_eq!(service.purge_expired(now), 1);
        assert_eq!(service.pending(), 1);
    }

    #[test]
    fn test_invalid_ttl_rejected() {
        assert!(
            OtpService::new(OtpConfig {
                ttl: Duration::zero()
            })
            .is_err()
        );
    }
}
