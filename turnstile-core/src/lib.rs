//! Core functionality for the turnstile login guard
//!
//! This crate contains the login guard, the credential store it sits in
//! front of, and the repository traits storage backends implement.
//!
//! See [`LoginGuard`] for the rate limiter, [`PasswordService`] for the
//! credential store, and [`repositories`] for the storage seam.
//!
//! Storage backends live in their own crates and only need to implement the
//! traits in [`repositories`]. An in-memory backend ships here for tests and
//! single-process use.
pub mod clock;
pub mod config;
pub mod credentials;
pub mod crypto;
pub mod error;
pub mod id;
pub mod repositories;
pub mod services;
pub mod storage;
pub mod user;
pub mod validation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{LockoutWindow, LoginGuardConfig, OtpConfig};
pub use credentials::CredentialStore;
pub use error::Error;
pub use services::{LoginGuard, LoginOutcome, OtpService, PasswordService};
pub use storage::{AccountState, AttemptOutcome, AttemptRecord, CleanupStats, LockState, LockTier};
pub use user::{NewUser, User, UserId};
