//! Configuration for the login guard and the one-time-password store.

use chrono::Duration;

use crate::Error;

/// A sliding window with the threshold that triggers a lock and the length
/// of the lock it triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutWindow {
    /// Length of the window ending at the current instant
    pub window: Duration,
    /// Failures inside the window (inclusive of the current one) that trigger a lock
    pub max_failures: u32,
    /// How long the resulting lock lasts
    pub lockout: Duration,
}

impl LockoutWindow {
    pub fn new(window: Duration, max_failures: u32, lockout: Duration) -> Self {
        Self {
            window,
            max_failures,
            lockout,
        }
    }

    fn validate(&self, name: &str) -> Result<(), Error> {
        if self.max_failures == 0 {
            return Err(Error::Config(format!(
                "{name}.max_failures must be greater than 0"
            )));
        }
        if self.window <= Duration::zero() {
            return Err(Error::Config(format!("{name}.window must be positive")));
        }
        if self.lockout <= Duration::zero() {
            return Err(Error::Config(format!("{name}.lockout must be positive")));
        }
        Ok(())
    }
}

/// Configuration for [`LoginGuard`](crate::services::LoginGuard).
///
/// The defaults lock an account for 2 hours after 3 failures within 2 hours,
/// and for 24 hours after 5 failures within 24 hours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginGuardConfig {
    /// When disabled the guard only verifies credentials and records nothing
    pub enabled: bool,
    /// Evaluated first; wins when both windows trip on the same attempt
    pub short_window: LockoutWindow,
    pub long_window: LockoutWindow,
    /// Attempt records older than this are pruned
    pub retention_period: Duration,
    /// Interval of the optional background cleanup task
    pub cleanup_interval: std::time::Duration,
}

impl Default for LoginGuardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            short_window: LockoutWindow::new(Duration::hours(2), 3, Duration::hours(2)),
            long_window: LockoutWindow::new(Duration::hours(24), 5, Duration::hours(24)),
            retention_period: Duration::hours(24),
            cleanup_interval: std::time::Duration::from_secs(3600),
        }
    }
}

impl LoginGuardConfig {
    /// Tighter thresholds with longer locks
    pub fn strict() -> Self {
        Self {
            short_window: LockoutWindow::new(Duration::hours(2), 2, Duration::hours(4)),
            long_window: LockoutWindow::new(Duration::hours(24), 4, Duration::hours(48)),
            retention_period: Duration::hours(48),
            ..Self::default()
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_short_window(mut self, window: LockoutWindow) -> Self {
        self.short_window = window;
        self
    }

    pub fn with_long_window(mut self, window: LockoutWindow) -> Self {
        self.long_window = window;
        self
    }

    pub fn with_retention_period(mut self, retention: Duration) -> Self {
        self.retention_period = retention;
        self
    }

    pub fn with_cleanup_interval(mut self, interval: std::time::Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Validate the configuration
    ///
    /// Retention must cover both windows, otherwise pruning could drop
    /// failures that still count.
    pub fn validate(&self) -> Result<(), Error> {
        self.short_window.validate("short_window")?;
        self.long_window.validate("long_window")?;

        let widest = self.short_window.window.max(self.long_window.window);
        if self.retention_period < widest {
            return Err(Error::Config(
                "retention_period must be at least as long as the widest window".to_string(),
            ));
        }
        if self.cleanup_interval.is_zero() {
            return Err(Error::Config(
                "cleanup_interval must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for [`OtpService`](crate::services::OtpService).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtpConfig {
    pub ttl: Duration,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::minutes(5),
        }
    }
}

impl OtpConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.ttl <= Duration::zero() {
            return Err(Error::Config("otp ttl must be positive".to_string()));
        }
        Ok(())
    }
}
