//! E2E tests for failed-attempt lockout.

use chrono::Utc;
use futures::future::join_all;
use gruda_auth::config::LockoutPolicy;
use gruda_auth::repositories::CredentialStore;
use gruda_auth::services::credential_service::{
    verify_credentials_at, LoginOutcome, RejectionReason,
};
use gruda_test_utils::{test_config, TestAuthServer, ALICE_PASSWORD, BOB_PASSWORD};
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

async fn server_with_max_attempts(max_failed_attempts: u32) -> Result<TestAuthServer, anyhow::Error> {
    let mut config = test_config();
    config.lockout = LockoutPolicy {
        max_failed_attempts,
        lockout_window: Duration::from_secs(10 * 60),
    };
    TestAuthServer::spawn_with_config(config).await
}

#[tokio::test]
async fn test_lockout_refuses_correct_password_with_same_response() -> Result<(), anyhow::Error> {
    let server = server_with_max_attempts(3).await?;
    let alice = server.create_user("alice", ALICE_PASSWORD, &[]).await?;

    for _ in 0..3 {
        let response = server.login_response("alice", BOB_PASSWORD).await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let locked = server.login_response("alice", ALICE_PASSWORD).await?;
    assert_eq!(locked.status(), StatusCode::UNAUTHORIZED);
    let locked_body: Value = locked.json().await?;

    let wrong = server.login_response("alice", BOB_PASSWORD).await?;
    let wrong_body: Value = wrong.json().await?;
    assert_eq!(locked_body, wrong_body);

    let state = server.store().get_lockout_state(&alice.id).await?;
    assert_eq!(state.failed_attempt_count, 3);
    assert!(state.locked_until.is_some());
    Ok(())
}

#[tokio::test]
async fn test_lockout_successful_login_resets_counter() -> Result<(), anyhow::Error> {
    let server = server_with_max_attempts(3).await?;
    let alice = server.create_user("alice", ALICE_PASSWORD, &[]).await?;

    for _ in 0..2 {
        server.login_response("alice", BOB_PASSWORD).await?;
    }
    assert_eq!(
        server.store().get_lockout_state(&alice.id).await?.failed_attempt_count,
        2
    );

    server.login("alice", ALICE_PASSWORD).await?;

    let state = server.store().get_lockout_state(&alice.id).await?;
    assert_eq!(state.failed_attempt_count, 0);
    assert_eq!(state.locked_until, None);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_lockout_concurrent_failures_are_all_counted() -> Result<(), anyhow::Error> {
    let server = server_with_max_attempts(10).await?;
    let alice = server.create_user("alice", ALICE_PASSWORD, &[]).await?;

    let attempts = (0..8).map(|_| server.login_response("alice", BOB_PASSWORD));
    for response in join_all(attempts).await {
        assert_eq!(response?.status(), StatusCode::UNAUTHORIZED);
    }

    let state = server.store().get_lockout_state(&alice.id).await?;
    assert_eq!(state.failed_attempt_count, 8);
    assert_eq!(state.locked_until, None);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_lockout_parallel_verifications_lose_no_updates() -> Result<(), anyhow::Error> {
    const ATTEMPTS: u32 = 64;

    let server = server_with_max_attempts(1000).await?;
    let alice = server.create_user("alice", ALICE_PASSWORD, &[]).await?;
    let policy = server.config().lockout;
    let now = Utc::now();

    let tasks = (0..ATTEMPTS).map(|_| {
        let store = Arc::clone(server.store());
        tokio::spawn(async move {
            verify_credentials_at(store.as_ref(), &policy, "alice", BOB_PASSWORD, now).await
        })
    });
    for task in join_all(tasks).await {
        let outcome = task??;
        assert_eq!(
            outcome,
            LoginOutcome::Rejected(RejectionReason::BadCredentials)
        );
    }

    let state = server.store().get_lockout_state(&alice.id).await?;
    assert_eq!(state.failed_attempt_count, ATTEMPTS);
    assert_eq!(state.locked_until, None);
    Ok(())
}

#[tokio::test]
async fn test_lockout_ends_when_window_passes() -> Result<(), anyhow::Error> {
    let server = server_with_max_attempts(3).await?;
    server.create_user("alice", ALICE_PASSWORD, &[]).await?;
    let policy = server.config().lockout;
    let store = server.store().as_ref();

    let start = Utc::now();
    for _ in 0..3 {
        verify_credentials_at(store, &policy, "alice", BOB_PASSWORD, start).await?;
    }
    let until = match verify_credentials_at(store, &policy, "alice", ALICE_PASSWORD, start).await? {
        LoginOutcome::LockedOut { until } => until,
        other => anyhow::bail!("expected lockout, got {:?}", other),
    };

    let outcome = verify_credentials_at(store, &policy, "alice", ALICE_PASSWORD, until).await?;

    assert!(matches!(outcome, LoginOutcome::Authenticated(_)));
    Ok(())
}
