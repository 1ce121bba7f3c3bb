//! Startup bootstrap of required roles and the administrator account.
//!
//! Safe to run on every start: existing roles and an existing admin user
//! are left untouched, and the admin password is never reset. Every
//! individual failure is collected and returned as one [`BootstrapError`].

use crate::config::{AdminBootstrapOptions, ADMIN_ROLE};
use crate::errors::{AuthError, BootstrapError, BootstrapFailure};
use crate::models::NewUser;
use crate::observability::hash_for_correlation;
use crate::observability::metrics::record_bootstrap_action;
use crate::repositories::{normalize_name, CredentialStore, RoleStore};
use crate::services::password_policy::{is_valid_email, validate_password};
use common::secret::ExposeSecret;
use tracing::instrument;

/// What a bootstrap run changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    pub roles_created: Vec<String>,
    pub roles_existing: Vec<String>,
    pub admin_created: bool,
}

/// Ensure `required_roles` exist and, if requested, the admin account.
///
/// The admin role is added to the role set whenever admin creation is on.
///
/// # Errors
///
/// Returns `AuthError::Bootstrap` listing every failed step. Always fatal.
#[instrument(skip_all, name = "gruda.services.bootstrap")]
pub async fn bootstrap(
    credential_store: &dyn CredentialStore,
    role_store: &dyn RoleStore,
    required_roles: &[String],
    admin: &AdminBootstrapOptions,
) -> Result<BootstrapReport, AuthError> {
    let mut report = BootstrapReport::default();
    let mut failures = Vec::new();

    let mut roles: Vec<String> = Vec::new();
    for role in required_roles
        .iter()
        .map(|r| r.trim())
        .chain(admin.create_admin_user.then_some(ADMIN_ROLE))
    {
        if role.is_empty() {
            continue;
        }
        if !roles.iter().any(|r| normalize_name(r) == normalize_name(role)) {
            roles.push(role.to_string());
        }
    }

    for role in &roles {
        match ensure_role(role_store, role).await {
            Ok(true) => report.roles_created.push(role.clone()),
            Ok(false) => report.roles_existing.push(role.clone()),
            Err(e) => {
                record_bootstrap_action("role", "failed");
                failures.push(BootstrapFailure {
                    subject: format!("role '{}'", role),
                    reason: e.to_string(),
                });
            }
        }
    }

    if admin.create_admin_user {
        match ensure_admin(credential_store, admin).await {
            Ok(created) => report.admin_created = created,
            Err(reason) => {
                record_bootstrap_action("admin", "failed");
                failures.push(BootstrapFailure {
                    subject: format!("admin user '{}'", admin.username),
                    reason,
                });
            }
        }
    }

    if !failures.is_empty() {
        let err = BootstrapError { failures };
        tracing::error!(target: "gruda.services.bootstrap", error = %err, "Bootstrap failed");
        return Err(err.into());
    }

    tracing::info!(
        target: "gruda.services.bootstrap",
        roles_created = report.roles_created.len(),
        roles_existing = report.roles_existing.len(),
        admin_created = report.admin_created,
        "Bootstrap complete"
    );
    Ok(report)
}

/// Returns whether the role had to be created.
async fn ensure_role(role_store: &dyn RoleStore, role: &str) -> Result<bool, AuthError> {
    if role_store.role_exists(role).await? {
        record_bootstrap_action("role", "exists");
        return Ok(false);
    }

    role_store.create_role(role).await?;
    record_bootstrap_action("role", "created");
    tracing::info!(target: "gruda.services.bootstrap", role = %role, "Created role");
    Ok(true)
}

/// Returns whether the admin account had to be created. Failures are
/// rendered to a single reason string.
async fn ensure_admin(
    store: &dyn CredentialStore,
    admin: &AdminBootstrapOptions,
) -> Result<bool, String> {
    let user_hash = hash_for_correlation(&admin.username);

    if admin.username.trim().is_empty() {
        return Err("username is empty".to_string());
    }

    if store
        .find_by_username(&admin.username)
        .await
        .map_err(|e| e.to_string())?
        .is_some()
    {
        record_bootstrap_action("admin", "exists");
        tracing::debug!(
            target: "gruda.services.bootstrap",
            user = %user_hash,
            "Admin user already exists, leaving it untouched"
        );
        return Ok(false);
    }

    let mut problems = Vec::new();
    if let Err(e) = validate_password(admin.default_password.expose_secret()) {
        problems.push(e.to_string());
    }
    if !is_valid_email(&admin.email) {
        problems.push("Validation error: Invalid email format".to_string());
    }
    if !problems.is_empty() {
        return Err(problems.join("; "));
    }

    let new_user = NewUser {
        username: admin.username.trim().to_string(),
        email: admin.email.clone(),
    };
    let user = store
        .create_user(&new_user, &admin.default_password)
        .await
        .map_err(|e| e.to_string())?;

    if let Err(grant_err) = store.add_user_role(&user.id, ADMIN_ROLE).await {
        // Roll back so the next start sees no admin and retries.
        return match store.delete_user(&user.id).await {
            Ok(()) => Err(format!(
                "granting role '{}' failed: {}; user removed",
                ADMIN_ROLE, grant_err
            )),
            Err(delete_err) => Err(format!(
                "granting role '{}' failed: {}; removing the user also failed: {}",
                ADMIN_ROLE, grant_err, delete_err
            )),
        };
    }

    record_bootstrap_action("admin", "created");
    tracing::info!(
        target: "gruda.services.bootstrap",
        user = %user_hash,
        "Created admin user"
    );
    Ok(true)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::MIN_BCRYPT_COST;
    use crate::repositories::memory::{InMemoryStore, StoreOperation};
    use common::secret::SecretString;

    fn admin(password: &str) -> AdminBootstrapOptions {
        AdminBootstrapOptions {
            username: "root".to_string(),
            email: "root@gruda.io".to_string(),
            default_password: SecretString::from(password.to_string()),
            create_admin_user: true,
        }
    }

    fn roles(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn bootstrap_failures(result: Result<BootstrapReport, AuthError>) -> Vec<BootstrapFailure> {
        match result {
            Err(AuthError::Bootstrap(err)) => err.failures,
            other => panic!("expected bootstrap error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_creates_roles_and_admin() {
        let store = InMemoryStore::new(MIN_BCRYPT_COST);

        let report = bootstrap(&store, &store, &roles(&["Editor"]), &admin("Adm1n!Passw0rd"))
            .await
            .unwrap();

        assert_eq!(report.roles_created, roles(&["Editor", "Admin"]));
        assert!(report.admin_created);

        let root = store.find_by_username("root").await.unwrap().unwrap();
        assert!(root.roles.contains(ADMIN_ROLE));
        assert!(store.verify_password(&root.id, "Adm1n!Passw0rd").await.unwrap());
    }

    #[tokio::test]
    async fn test_second_run_changes_nothing() {
        let store = InMemoryStore::new(MIN_BCRYPT_COST);
        let required = roles(&["Admin", "Editor"]);

        bootstrap(&store, &store, &required, &admin("Adm1n!Passw0rd"))
            .await
            .unwrap();
        let root = store.find_by_username("root").await.unwrap().unwrap();
        let hash = store.password_hash(&root.id).await.unwrap();

        // A different configured password must not reset the existing one.
        let report = bootstrap(&store, &store, &required, &admin("N3w!Password"))
            .await
            .unwrap();

        assert!(report.roles_created.is_empty());
        assert_eq!(report.roles_existing, required);
        assert!(!report.admin_created);
        assert_eq!(store.user_count().await, 1);
        assert_eq!(store.role_names().await.len(), 2);
        assert_eq!(store.password_hash(&root.id).await.unwrap(), hash);
    }

    #[tokio::test]
    async fn test_admin_creation_disabled() {
        let store = InMemoryStore::new(MIN_BCRYPT_COST);

        let report = bootstrap(
            &store,
            &store,
            &roles(&["Viewer"]),
            &AdminBootstrapOptions::disabled(),
        )
        .await
        .unwrap();

        assert_eq!(report.roles_created, roles(&["Viewer"]));
        assert_eq!(store.user_count().await, 0);
        assert!(!store.role_exists(ADMIN_ROLE).await.unwrap());
    }

    #[tokio::test]
    async fn test_weak_password_and_bad_email_fail_together() {
        let store = InMemoryStore::new(MIN_BCRYPT_COST);
        let mut options = admin("weak");
        options.email = "not-an-email".to_string();

        let failures =
            bootstrap_failures(bootstrap(&store, &store, &roles(&["Admin"]), &options).await);

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].subject, "admin user 'root'");
        assert!(failures[0].reason.contains("at least 8 characters"));
        assert!(failures[0].reason.contains("email"));
        assert_eq!(store.user_count().await, 0);
    }

    #[tokio::test]
    async fn test_all_failures_are_collected() {
        let store = InMemoryStore::new(MIN_BCRYPT_COST);
        store.fail_on(StoreOperation::CreateRole).await;

        let failures = bootstrap_failures(
            bootstrap(&store, &store, &roles(&["Admin", "Editor"]), &admin("Adm1n!Passw0rd")).await,
        );

        // Two roles plus the admin grant, which needs the missing Admin role.
        assert_eq!(failures.len(), 3);
        assert!(failures.iter().any(|f| f.subject == "role 'Admin'"));
        assert!(failures.iter().any(|f| f.subject == "role 'Editor'"));
        assert!(failures.iter().any(|f| f.subject == "admin user 'root'"));
    }

    #[tokio::test]
    async fn test_failed_grant_removes_created_user() {
        let store = InMemoryStore::new(MIN_BCRYPT_COST);
        store.fail_on(StoreOperation::AddUserRole).await;

        let failures = bootstrap_failures(
            bootstrap(&store, &store, &roles(&[]), &admin("Adm1n!Passw0rd")).await,
        );
        assert_eq!(failures.len(), 1);
        assert!(failures[0].reason.contains("user removed"));
        assert_eq!(store.user_count().await, 0);

        // Next start retries cleanly.
        store.clear_failures().await;
        let report = bootstrap(&store, &store, &roles(&[]), &admin("Adm1n!Passw0rd"))
            .await
            .unwrap();
        assert!(report.admin_created);
        assert_eq!(report.roles_existing, roles(&["Admin"]));
    }

    #[tokio::test]
    async fn test_duplicate_role_names_collapse() {
        let store = InMemoryStore::new(MIN_BCRYPT_COST);

        let report = bootstrap(
            &store,
            &store,
            &roles(&["Admin", "admin", " Editor "]),
            &AdminBootstrapOptions::disabled(),
        )
        .await
        .unwrap();

        assert_eq!(report.roles_created, roles(&["Admin", "Editor"]));
    }
}
