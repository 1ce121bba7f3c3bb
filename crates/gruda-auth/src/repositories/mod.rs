//! Store contracts consumed by the auth core, plus their implementations.
//!
//! - [`memory::InMemoryStore`] backs tests and local runs.
//! - [`users::PgCredentialStore`] and [`roles::PgRoleStore`] back the service
//!   binary.

pub mod memory;
pub mod roles;
pub mod users;

use crate::errors::AuthError;
use crate::models::{Claim, LockoutState, LockoutUpdate, NewUser, UserIdentity};
use common::secret::SecretString;
use std::collections::BTreeSet;

/// User lookup, password checks and lockout bookkeeping.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up a user by username. Matching is case-insensitive.
    async fn find_by_username(&self, username: &str) -> Result<Option<UserIdentity>, AuthError>;

    /// Check a plaintext password against the stored hash.
    async fn verify_password(&self, user_id: &str, password: &str) -> Result<bool, AuthError>;

    async fn get_lockout_state(&self, user_id: &str) -> Result<LockoutState, AuthError>;

    /// Replace the lockout state only if it still equals `expected`.
    async fn update_lockout_state(
        &self,
        user_id: &str,
        expected: LockoutState,
        new: LockoutState,
    ) -> Result<LockoutUpdate, AuthError>;

    /// Create a user with a hashed copy of `password`.
    async fn create_user(
        &self,
        user: &NewUser,
        password: &SecretString,
    ) -> Result<UserIdentity, AuthError>;

    async fn delete_user(&self, user_id: &str) -> Result<(), AuthError>;

    /// Grant a role. The role must already exist.
    async fn add_user_role(&self, user_id: &str, role: &str) -> Result<(), AuthError>;

    async fn get_roles(&self, user_id: &str) -> Result<BTreeSet<String>, AuthError>;

    /// Claims attached directly to the user.
    async fn get_claims(&self, user_id: &str) -> Result<Vec<Claim>, AuthError>;
}

/// Role existence, creation and role-attached claims.
#[async_trait::async_trait]
pub trait RoleStore: Send + Sync {
    async fn role_exists(&self, name: &str) -> Result<bool, AuthError>;

    async fn create_role(&self, name: &str) -> Result<(), AuthError>;

    /// Claims attached to a role. Only called when
    /// [`supports_role_claims`](RoleStore::supports_role_claims) is true.
    async fn get_claims(&self, role: &str) -> Result<Vec<Claim>, AuthError>;

    fn supports_role_claims(&self) -> bool;
}

/// Case-folded key used for username and role-name uniqueness.
pub(crate) fn normalize_name(name: &str) -> String {
    name.trim().to_uppercase()
}
