//! E2E tests for the startup bootstrap of roles and the admin account.

use gruda_auth::config::{Config, MIN_BCRYPT_COST};
use gruda_auth::errors::AuthError;
use gruda_auth::repositories::RoleStore;
use gruda_auth::services::bootstrap_service::bootstrap;
use gruda_test_utils::{
    test_admin_options, TestAuthServer, TokenAssertions, ADMIN_PASSWORD, ROLE_ADMIN, ROLE_VIEWER,
};
use std::collections::HashMap;

fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn test_bootstrapped_admin_can_log_in() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let store = server.store().as_ref();

    let report = bootstrap(
        store,
        store,
        &[ROLE_VIEWER.to_string()],
        &test_admin_options(),
    )
    .await?;
    assert!(report.admin_created);

    let token = server.login("root", ADMIN_PASSWORD).await?;
    token.assert_has_role(ROLE_ADMIN).assert_lacks_role(ROLE_VIEWER);
    assert!(store.role_exists(ROLE_VIEWER).await?);
    Ok(())
}

#[tokio::test]
async fn test_bootstrap_from_environment_is_idempotent() -> Result<(), anyhow::Error> {
    let config = Config::from_vars(&vars(&[
        ("DATABASE_URL", "postgresql://localhost/gruda"),
        ("GRUDA_JWT_SECRET", "0123456789abcdef0123456789abcdef"),
        ("GRUDA_JWT_ISSUER", "gruda"),
        ("GRUDA_JWT_AUDIENCE", "gruda-clients"),
        ("GRUDA_REQUIRED_ROLES", "Editor, Viewer"),
        ("GRUDA_ADMIN_CREATE", "true"),
        ("GRUDA_ADMIN_USERNAME", "root"),
        ("GRUDA_ADMIN_EMAIL", "root@gruda.io"),
        ("GRUDA_ADMIN_PASSWORD", ADMIN_PASSWORD),
        ("BCRYPT_COST", "10"),
    ]))?;
    assert_eq!(config.bcrypt_cost, MIN_BCRYPT_COST);
    let server = TestAuthServer::spawn_with_config(config.clone()).await?;
    let store = server.store().as_ref();

    let first = bootstrap(store, store, &config.required_roles, &config.admin).await?;
    let second = bootstrap(store, store, &config.required_roles, &config.admin).await?;

    assert_eq!(first.roles_created.len(), 3);
    assert!(first.admin_created);
    assert!(second.roles_created.is_empty());
    assert!(!second.admin_created);
    assert_eq!(store.user_count().await, 1);
    assert_eq!(store.role_names().await.len(), 3);

    server.login("root", ADMIN_PASSWORD).await?;
    Ok(())
}

#[tokio::test]
async fn test_bootstrap_weak_admin_password_is_fatal() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let store = server.store().as_ref();
    let mut admin = test_admin_options();
    admin.default_password = "password".to_string().into();

    let result = bootstrap(store, store, &[], &admin).await;

    match result {
        Err(AuthError::Bootstrap(err)) => {
            assert_eq!(err.failures.len(), 1);
            assert!(err.to_string().contains("admin user 'root'"));
        }
        other => panic!("expected bootstrap failure, got {:?}", other),
    }
    assert_eq!(store.user_count().await, 0);
    Ok(())
}
