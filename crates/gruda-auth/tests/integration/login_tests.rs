//! E2E tests for password login and the identity endpoint.
//!
//! Tests follow the convention: `test_<feature>_<scenario>_<expected_result>`

use gruda_auth::models::{Claim, TokenResponse};
use gruda_test_utils::{
    TestAuthServer, TokenAssertions, ALICE_PASSWORD, BOB_PASSWORD, ROLE_ADMIN, ROLE_EDITOR,
    TEST_AUDIENCE, TEST_ISSUER,
};
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn test_login_valid_credentials_returns_bearer_token() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let alice = server
        .create_user("alice", ALICE_PASSWORD, &[ROLE_ADMIN, ROLE_EDITOR])
        .await?;

    let response = server.login_response("alice", ALICE_PASSWORD).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body: TokenResponse = response.json().await?;
    assert_eq!(body.token_type, "Bearer");
    assert_eq!(body.expires_in, 1200);

    body.access_token
        .assert_valid_jwt()
        .assert_for_subject(&alice.id)
        .assert_unique_name("alice")
        .assert_has_role(ROLE_ADMIN)
        .assert_has_role(ROLE_EDITOR)
        .assert_lifetime(1200)
        .assert_issued_for(TEST_ISSUER, TEST_AUDIENCE);
    Ok(())
}

#[tokio::test]
async fn test_login_username_is_case_insensitive() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    server.create_user("alice", ALICE_PASSWORD, &[]).await?;

    let token = server.login("ALICE", ALICE_PASSWORD).await?;

    token.assert_unique_name("alice");
    Ok(())
}

#[tokio::test]
async fn test_login_includes_role_and_user_claims() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let alice = server.create_user("alice", ALICE_PASSWORD, &[ROLE_EDITOR]).await?;
    server
        .store()
        .add_role_claim(ROLE_EDITOR, Claim::new("permission", "posts.edit"))
        .await?;
    server
        .store()
        .add_user_claim(&alice.id, Claim::new("tenant", "north"))
        .await?;

    let token = server.login("alice", ALICE_PASSWORD).await?;
    let identity = gruda_auth::services::token_service::validate_token(
        &token,
        &server.config().signing,
    )?;

    assert_eq!(
        identity.claim_values("permission").collect::<Vec<_>>(),
        vec!["posts.edit"]
    );
    assert_eq!(
        identity.claim_values("tenant").collect::<Vec<_>>(),
        vec!["north"]
    );
    Ok(())
}

#[tokio::test]
async fn test_login_failures_share_one_response() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    server.create_user("alice", ALICE_PASSWORD, &[]).await?;

    let unknown = server.login_response("mallory", ALICE_PASSWORD).await?;
    let wrong = server.login_response("alice", BOB_PASSWORD).await?;

    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    let unknown_body: Value = unknown.json().await?;
    let wrong_body: Value = wrong.json().await?;
    assert_eq!(unknown_body, wrong_body);
    assert_eq!(unknown_body["error"]["code"], "INVALID_CREDENTIALS");
    Ok(())
}

#[tokio::test]
async fn test_login_empty_password_is_bad_request() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    server.create_user("alice", ALICE_PASSWORD, &[]).await?;

    let response = server.login_response("alice", "").await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    Ok(())
}

#[tokio::test]
async fn test_login_malformed_body_is_rejected() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;

    let response = reqwest::Client::new()
        .post(format!("{}/api/account/login", server.url()))
        .json(&json!({ "username": "alice" }))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    Ok(())
}

#[tokio::test]
async fn test_authtest_echoes_token_identity() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let alice = server
        .create_user("alice", ALICE_PASSWORD, &[ROLE_ADMIN, ROLE_EDITOR])
        .await?;
    let token = server.login("alice", ALICE_PASSWORD).await?;

    let response = server.authtest(&token).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["user_name"], "alice");
    assert_eq!(body["id"], alice.id);
    assert_eq!(body["roles"], json!([ROLE_ADMIN, ROLE_EDITOR]));
    Ok(())
}

#[tokio::test]
async fn test_authtest_without_token_is_unauthorized() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;

    let response = reqwest::get(format!("{}/api/authtest", server.url())).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response
        .headers()
        .get(reqwest::header::WWW_AUTHENTICATE)
        .is_some());
    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "INVALID_TOKEN");
    Ok(())
}
