//! E2E tests for bearer token validation on the identity endpoint.
//!
//! Every rejection must produce the same 401 body, whatever the reason.

use chrono::Utc;
use gruda_test_utils::{
    tamper_signature, TestAuthServer, TestTokenBuilder, ALICE_PASSWORD, TEST_USER_ALICE,
};
use jsonwebtoken::Algorithm;
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn assert_rejected(server: &TestAuthServer, token: &str) -> Result<Value, anyhow::Error> {
    let response = server.authtest(token).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "INVALID_TOKEN");
    Ok(body)
}

#[tokio::test]
async fn test_crafted_token_with_roles_array_is_accepted() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let token = TestTokenBuilder::new()
        .with_role("Admin")
        .with_role("Editor")
        .audiences(&["other-app", "gruda-clients"])
        .sign();

    let response = server.authtest(&token).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["id"], TEST_USER_ALICE.to_string());
    assert_eq!(body["user_name"], "alice");
    assert_eq!(body["roles"], json!(["Admin", "Editor"]));
    Ok(())
}

#[tokio::test]
async fn test_rejections_share_one_body() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let now = Utc::now().timestamp();

    let tokens = vec![
        TestTokenBuilder::new().valid_between(now - 1300, now - 100).sign(),
        TestTokenBuilder::new().valid_between(now + 600, now + 1800).sign(),
        TestTokenBuilder::new().issuer("someone-else").sign(),
        TestTokenBuilder::new().audience("other-app").sign(),
        TestTokenBuilder::new().signed_with(b"ffffffffffffffffffffffffffffffff").sign(),
        TestTokenBuilder::new().algorithm(Algorithm::HS384).sign(),
        TestTokenBuilder::new().unsigned(),
        TestTokenBuilder::new().without_claim("sub").sign(),
        tamper_signature(&TestTokenBuilder::new().sign()),
        "not-a-token".to_string(),
    ];

    let mut bodies = Vec::new();
    for token in &tokens {
        bodies.push(assert_rejected(&server, token).await?);
    }
    assert!(bodies.windows(2).all(|pair| pair[0] == pair[1]));
    Ok(())
}

#[tokio::test]
async fn test_issued_token_rejected_after_tampering() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    server.create_user("alice", ALICE_PASSWORD, &[]).await?;
    let token = server.login("alice", ALICE_PASSWORD).await?;

    assert_eq!(server.authtest(&token).await?.status(), StatusCode::OK);
    assert_rejected(&server, &tamper_signature(&token)).await?;
    Ok(())
}

#[tokio::test]
async fn test_token_from_server_with_other_secret_is_rejected() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;

    let mut other_config = gruda_test_utils::test_config();
    other_config.signing = gruda_auth::config::SigningPolicy::new(
        b"abcdefghijklmnopqrstuvwxyz012345".to_vec(),
        gruda_test_utils::TEST_ISSUER,
        gruda_test_utils::TEST_AUDIENCE,
        std::time::Duration::from_secs(60),
    );
    let other = TestAuthServer::spawn_with_config(other_config).await?;
    other.create_user("alice", ALICE_PASSWORD, &[]).await?;
    let foreign = other.login("alice", ALICE_PASSWORD).await?;

    assert_rejected(&server, &foreign).await?;
    Ok(())
}
