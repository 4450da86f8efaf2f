use std::sync::Arc;

use chrono::{Duration, Utc};
use turnstile::{
    AccountState, InMemoryRepositoryProvider, LockoutWindow, LoginGuardConfig, LoginOutcome,
    ManualClock, OtpConfig, Turnstile, TurnstileConfig, TurnstileError,
};

async fn setup(clock: &ManualClock) -> Turnstile<InMemoryRepositoryProvider> {
    let turnstile = Turnstile::new(Arc::new(InMemoryRepositoryProvider::new()))
        .unwrap()
        .with_clock(clock.clone());
    turnstile
        .register_user("alice", "correct-password", "correct-password")
        .await
        .unwrap();
    turnstile
}

#[tokio::test]
async fn test_success_resets_history() {
    let clock = ManualClock::new(Utc::now());
    let turnstile = setup(&clock).await;

    turnstile.login("alice", "wrong").await;
    clock.advance(Duration::minutes(5));
    turnstile.login("alice", "wrong").await;
    assert_eq!(
        turnstile.account_state("alice").await.unwrap(),
        AccountState::Warned { failures: 2 }
    );

    clock.advance(Duration::minutes(5));
    assert!(turnstile.login("alice", "correct-password").await.is_success());
    assert_eq!(
        turnstile.account_state("alice").await.unwrap(),
        AccountState::Clear
    );
}

#[tokio::test]
async fn test_lock_expires_without_cleanup() {
    let clock = ManualClock::new(Utc::now());
    let turnstile = setup(&clock).await;

    for _ in 0..3 {
        turnstile.login("alice", "wrong").await;
    }
    assert!(turnstile.lock_status("alice").await.unwrap().is_some());

    clock.advance(Duration::hours(2) + Duration::seconds(1));
    assert!(turnstile.lock_status("alice").await.unwrap().is_none());
    assert!(turnstile.login("alice", "wrong").await.is_rejected());
}

#[tokio::test]
async fn test_change_password_goes_through_guard() {
    let clock = ManualClock::new(Utc::now());
    let turnstile = setup(&clock).await;

    let result = turnstile
        .change_password("alice", "wrong", "brand-new-password")
        .await;
    assert!(matches!(result, Err(TurnstileError::AuthError(_))));
    assert_eq!(
        turnstile.account_state("alice").await.unwrap(),
        AccountState::Warned { failures: 1 }
    );

    turnstile
        .change_password("alice", "correct-password", "brand-new-password")
        .await
        .unwrap();
    assert!(turnstile.login("alice", "correct-password").await.is_rejected());
    assert!(turnstile.login("alice", "brand-new-password").await.is_success());
}

#[tokio::test]
async fn test_otp_codes() {
    let clock = ManualClock::new(Utc::now());
    let turnstile = setup(&clock).await;

    let code = turnstile.generate_otp("alice").unwrap();
    assert_eq!(code.len(), 4);
    assert!(turnstile.verify_otp("alice", &code));
    assert!(!turnstile.verify_otp("alice", &code));

    let code = turnstile.generate_otp("alice").unwrap();
    clock.advance(Duration::minutes(6));
    assert!(!turnstile.verify_otp("alice", &code));
}

#[tokio::test]
async fn test_custom_config() {
    let clock = ManualClock::new(Utc::now());
    let config = TurnstileConfig::default()
        .with_guard(LoginGuardConfig::default().with_short_window(LockoutWindow::new(
            Duration::minutes(1),
            2,
            Duration::minutes(10),
        )))
        .with_otp(OtpConfig {
            ttl: Duration::seconds(30),
        });
    let turnstile = Turnstile::with_config(Arc::new(InMemoryRepositoryProvider::new()), config)
        .unwrap()
        .with_clock(clock.clone());

    turnstile.login("bob", "x").await;
    match turnstile.login("bob", "y").await {
        LoginOutcome::Locked { retry_after, .. } => assert_eq!(retry_after, Duration::minutes(10)),
        other => panic!("expected lock, got {other:?}"),
    }
}

#[tokio::test]
async fn test_validation_errors() {
    let clock = ManualClock::new(Utc::now());
    let turnstile = setup(&clock).await;

    let result = turnstile.register_user("bob", "password1", "password2").await;
    assert!(matches!(result, Err(TurnstileError::ValidationError(_))));

    assert!(matches!(
        turnstile.login("", "whatever").await,
        LoginOutcome::Error(_)
    ));
}

#[tokio::test]
async fn test_cleanup_task_stops_on_shutdown() {
    let clock = ManualClock::new(Utc::now());
    let turnstile = setup(&clock).await;

    let (tx, rx) = tokio::sync::watch::channel(false);
    let handle = turnstile.start_cleanup_task(rx);
    tx.send(true).unwrap();
    handle.await.unwrap();
}
