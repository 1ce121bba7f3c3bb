//! Password login: verify credentials, aggregate claims, issue a token.

use crate::config::Config;
use crate::errors::AuthError;
use crate::models::IssuedToken;
use crate::observability::metrics::{record_error, record_login_attempt};
use crate::observability::ErrorCategory;
use crate::repositories::{CredentialStore, RoleStore};
use crate::services::claims_service::aggregate_claims;
use crate::services::credential_service::{verify_credentials_at, LoginOutcome};
use crate::services::token_service::issue_token_at;
use chrono::{DateTime, Utc};
use std::time::Instant;
use tracing::instrument;

/// Log a user in with the current time.
pub async fn login(
    credential_store: &dyn CredentialStore,
    role_store: &dyn RoleStore,
    config: &Config,
    username: &str,
    password: &str,
) -> Result<IssuedToken, AuthError> {
    login_at(
        credential_store,
        role_store,
        config,
        username,
        password,
        Utc::now(),
    )
    .await
}

/// Log a user in as of `now`.
///
/// A successful login always carries the full claim set.
///
/// # Errors
///
/// - `Validation` for an empty username or password
/// - `InvalidCredentials` or `LockedOut` when the attempt is refused; both
///   render as the same 401
/// - `Store`, `Precondition` or `Crypto` for internal failures
#[instrument(skip_all, name = "gruda.services.login")]
pub async fn login_at(
    credential_store: &dyn CredentialStore,
    role_store: &dyn RoleStore,
    config: &Config,
    username: &str,
    password: &str,
    now: DateTime<Utc>,
) -> Result<IssuedToken, AuthError> {
    let start = Instant::now();

    let result = authenticate(credential_store, role_store, config, username, password, now).await;

    let outcome = match &result {
        Ok(_) => "authenticated",
        Err(AuthError::InvalidCredentials) => "rejected",
        Err(AuthError::LockedOut { .. }) => "locked_out",
        Err(AuthError::Validation(_)) => "invalid_request",
        Err(_) => "error",
    };
    record_login_attempt(outcome, start.elapsed());

    if let Err(e) = &result {
        record_error(
            "login",
            ErrorCategory::from(e).as_str(),
            e.status_code().as_u16(),
        );
    }

    result
}

async fn authenticate(
    credential_store: &dyn CredentialStore,
    role_store: &dyn RoleStore,
    config: &Config,
    username: &str,
    password: &str,
    now: DateTime<Utc>,
) -> Result<IssuedToken, AuthError> {
    let outcome =
        verify_credentials_at(credential_store, &config.lockout, username, password, now).await?;

    let user = match outcome {
        LoginOutcome::Authenticated(user) => user,
        LoginOutcome::Rejected(_) => return Err(AuthError::InvalidCredentials),
        LoginOutcome::LockedOut { until } => return Err(AuthError::LockedOut { until }),
    };

    let claims = aggregate_claims(&user, credential_store, role_store).await?;
    issue_token_at(&claims, &config.signing, now)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::{
        AdminBootstrapOptions, LockoutPolicy, SigningPolicy, MIN_BCRYPT_COST,
    };
    use crate::models::{Claim, NewUser};
    use crate::repositories::memory::{InMemoryStore, StoreOperation};
    use crate::services::token_service::validate_token_at;
    use chrono::TimeZone;
    use common::secret::SecretString;
    use std::time::Duration;

    fn test_config(max_failed_attempts: u32) -> Config {
        Config {
            database_url: String::new(),
            bind_address: "127.0.0.1:0".to_string(),
            signing: SigningPolicy::new(
                b"0123456789abcdef0123456789abcdef".to_vec(),
                "gruda".to_string(),
                "gruda-clients".to_string(),
                Duration::from_secs(20 * 60),
            ),
            lockout: LockoutPolicy {
                max_failed_attempts,
                lockout_window: Duration::from_secs(10 * 60),
            },
            required_roles: vec!["Admin".to_string()],
            admin: AdminBootstrapOptions::disabled(),
            bcrypt_cost: MIN_BCRYPT_COST,
        }
    }

    async fn store_with_alice() -> InMemoryStore {
        let store = InMemoryStore::new(MIN_BCRYPT_COST);
        let user = store
            .create_user(
                &NewUser {
                    username: "alice".to_string(),
                    email: "alice@gruda.io".to_string(),
                },
                &SecretString::from("Passw0rd!"),
            )
            .await
            .unwrap();
        store.create_role("Admin").await.unwrap();
        store.add_user_role(&user.id, "Admin").await.unwrap();
        store
            .add_user_claim(&user.id, Claim::new("tenant", "north"))
            .await
            .unwrap();
        store
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_login_issues_full_claim_token() {
        let store = store_with_alice().await;
        let config = test_config(10);

        let issued = login_at(&store, &store, &config, "alice", "Passw0rd!", t0())
            .await
            .unwrap();

        let identity = validate_token_at(&issued.token, &config.signing, t0()).unwrap();
        assert_eq!(identity.unique_name, "alice");
        assert!(identity.has_role("Admin"));
        assert_eq!(
            identity.claim_values("tenant").collect::<Vec<_>>(),
            vec!["north"]
        );
        assert_eq!(issued.expires_in_seconds, 1200);
    }

    #[tokio::test]
    async fn test_unknown_user_and_wrong_password_look_the_same() {
        let store = store_with_alice().await;
        let config = test_config(10);

        let unknown = login_at(&store, &store, &config, "mallory", "Passw0rd!", t0()).await;
        let wrong = login_at(&store, &store, &config, "alice", "nope", t0()).await;

        assert!(matches!(unknown, Err(AuthError::InvalidCredentials)));
        assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_locked_account_refuses_correct_password() {
        let store = store_with_alice().await;
        let config = test_config(2);

        for _ in 0..2 {
            let _ = login_at(&store, &store, &config, "alice", "nope", t0()).await;
        }

        let result = login_at(&store, &store, &config, "alice", "Passw0rd!", t0()).await;
        match result {
            Err(AuthError::LockedOut { until }) => {
                assert_eq!(until, t0() + chrono::Duration::minutes(10));
            }
            other => panic!("expected lockout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_password_is_validation_error() {
        let store = store_with_alice().await;
        let config = test_config(10);

        let result = login_at(&store, &store, &config, "alice", "", t0()).await;
        assert!(matches!(result, Err(AuthError::Validation(_))));
    }

    #[tokio::test]
    async fn test_claim_store_failure_issues_no_token() {
        let store = store_with_alice().await;
        store.fail_on(StoreOperation::GetUserClaims).await;
        let config = test_config(10);

        let result = login_at(&store, &store, &config, "alice", "Passw0rd!", t0()).await;
        assert!(matches!(result, Err(AuthError::Store(_))));
    }
}
