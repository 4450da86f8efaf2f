//! Service layer for business logic
//!
//! This module contains the login guard and the services it sits in front of.

pub mod guard;
pub mod otp;
pub mod password;

pub use guard::{LoginGuard, LoginOutcome};
pub use otp::OtpService;
pub use password::PasswordService;
