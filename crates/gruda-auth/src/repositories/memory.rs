//! In-memory credential and role store.
//!
//! Every mutation takes the write half of one `tokio::sync::RwLock`, so the
//! compare-and-set on lockout state is atomic with respect to every other
//! caller. Failure injection hooks let tests drive the error paths of the
//! services without a database.

use super::{normalize_name, CredentialStore, RoleStore};
use crate::config::DEFAULT_BCRYPT_COST;
use crate::crypto;
use crate::errors::AuthError;
use crate::models::{Claim, LockoutState, LockoutUpdate, NewUser, UserIdentity};
use chrono::{DateTime, Utc};
use common::secret::{ExposeSecret, SecretString};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Store operations that can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    FindUser,
    VerifyPassword,
    GetLockoutState,
    UpdateLockoutState,
    CreateUser,
    DeleteUser,
    AddUserRole,
    GetRoles,
    GetUserClaims,
    RoleExists,
    CreateRole,
    GetRoleClaims,
}

struct StoredUser {
    id: String,
    username: String,
    email: String,
    created_on: DateTime<Utc>,
    password_hash: String,
    lockout: LockoutState,
    roles: BTreeSet<String>,
    claims: Vec<Claim>,
}

impl StoredUser {
    fn identity(&self) -> UserIdentity {
        UserIdentity {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            created_on: self.created_on,
            roles: self.roles.clone(),
        }
    }
}

#[derive(Default)]
struct Inner {
    users: HashMap<String, StoredUser>,
    /// normalized username -> user id
    usernames: HashMap<String, String>,
    /// normalized role name -> (display name, claims)
    roles: BTreeMap<String, (String, Vec<Claim>)>,
    failing: HashSet<StoreOperation>,
    forced_conflicts: u32,
}

impl Inner {
    fn check(&self, op: StoreOperation) -> Result<(), AuthError> {
        if self.failing.contains(&op) {
            return Err(AuthError::Store(format!("Injected failure in {:?}", op)));
        }
        Ok(())
    }

    fn user(&self, user_id: &str) -> Result<&StoredUser, AuthError> {
        self.users
            .get(user_id)
            .ok_or_else(|| AuthError::Store(format!("User '{}' not found", user_id)))
    }

    fn user_mut(&mut self, user_id: &str) -> Result<&mut StoredUser, AuthError> {
        self.users
            .get_mut(user_id)
            .ok_or_else(|| AuthError::Store(format!("User '{}' not found", user_id)))
    }
}

/// Thread-safe in-memory implementation of [`CredentialStore`] and
/// [`RoleStore`].
pub struct InMemoryStore {
    inner: RwLock<Inner>,
    bcrypt_cost: u32,
    role_claims_supported: bool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_BCRYPT_COST)
    }
}

impl InMemoryStore {
    pub fn new(bcrypt_cost: u32) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            bcrypt_cost,
            role_claims_supported: true,
        }
    }

    /// Build a store whose role manager cannot attach claims to roles.
    pub fn without_role_claims(mut self) -> Self {
        self.role_claims_supported = false;
        self
    }

    /// Make every future call of `op` fail with a store error.
    pub async fn fail_on(&self, op: StoreOperation) {
        self.inner.write().await.failing.insert(op);
    }

    pub async fn clear_failures(&self) {
        self.inner.write().await.failing.clear();
    }

    /// Make the next `count` lockout updates report a conflict.
    pub async fn force_lockout_conflicts(&self, count: u32) {
        self.inner.write().await.forced_conflicts = count;
    }

    /// Attach a claim to an existing role.
    pub async fn add_role_claim(&self, role: &str, claim: Claim) -> Result<(), AuthError> {
        let mut inner = self.inner.write().await;
        let (_, claims) = inner
            .roles
            .get_mut(&normalize_name(role))
            .ok_or_else(|| AuthError::Store(format!("Role '{}' does not exist", role)))?;
        claims.push(claim);
        Ok(())
    }

    /// Attach a claim directly to a user.
    pub async fn add_user_claim(&self, user_id: &str, claim: Claim) -> Result<(), AuthError> {
        let mut inner = self.inner.write().await;
        inner.user_mut(user_id)?.claims.push(claim);
        Ok(())
    }

    pub async fn user_count(&self) -> usize {
        self.inner.read().await.users.len()
    }

    /// Role names in creation-independent (sorted) order.
    pub async fn role_names(&self) -> Vec<String> {
        self.inner
            .read()
            .await
            .roles
            .values()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Stored bcrypt hash, for asserting a password was not reset.
    pub async fn password_hash(&self, user_id: &str) -> Result<String, AuthError> {
        Ok(self.inner.read().await.user(user_id)?.password_hash.clone())
    }
}

#[async_trait::async_trait]
impl CredentialStore for InMemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserIdentity>, AuthError> {
        let inner = self.inner.read().await;
        inner.check(StoreOperation::FindUser)?;

        Ok(inner
            .usernames
            .get(&normalize_name(username))
            .and_then(|id| inner.users.get(id))
            .map(StoredUser::identity))
    }

    async fn verify_password(&self, user_id: &str, password: &str) -> Result<bool, AuthError> {
        let hash = {
            let inner = self.inner.read().await;
            inner.check(StoreOperation::VerifyPassword)?;
            inner.user(user_id)?.password_hash.clone()
        };
        crypto::verify_password(password, &hash)
    }

    async fn get_lockout_state(&self, user_id: &str) -> Result<LockoutState, AuthError> {
        let inner = self.inner.read().await;
        inner.check(StoreOperation::GetLockoutState)?;
        Ok(inner.user(user_id)?.lockout)
    }

    async fn update_lockout_state(
        &self,
        user_id: &str,
        expected: LockoutState,
        new: LockoutState,
    ) -> Result<LockoutUpdate, AuthError> {
        let mut inner = self.inner.write().await;
        inner.check(StoreOperation::UpdateLockoutState)?;

        if inner.forced_conflicts > 0 {
            inner.forced_conflicts -= 1;
            return Ok(LockoutUpdate::Conflict);
        }

        let user = inner.user_mut(user_id)?;
        if user.lockout != expected {
            return Ok(LockoutUpdate::Conflict);
        }
        user.lockout = new;
        Ok(LockoutUpdate::Updated)
    }

    async fn create_user(
        &self,
        user: &NewUser,
        password: &SecretString,
    ) -> Result<UserIdentity, AuthError> {
        {
            let inner = self.inner.read().await;
            inner.check(StoreOperation::CreateUser)?;
        }

        // Hash outside the lock; bcrypt is slow.
        let password_hash = crypto::hash_password(password.expose_secret(), self.bcrypt_cost)?;

        let mut inner = self.inner.write().await;
        let key = normalize_name(&user.username);
        if inner.usernames.contains_key(&key) {
            return Err(AuthError::Store(format!(
                "User '{}' already exists",
                user.username
            )));
        }

        let stored = StoredUser {
            id: Uuid::new_v4().to_string(),
            username: user.username.clone(),
            email: user.email.clone(),
            created_on: Utc::now(),
            password_hash,
            lockout: LockoutState::default(),
            roles: BTreeSet::new(),
            claims: Vec::new(),
        };
        let identity = stored.identity();
        inner.usernames.insert(key, stored.id.clone());
        inner.users.insert(stored.id.clone(), stored);
        Ok(identity)
    }

    async fn delete_user(&self, user_id: &str) -> Result<(), AuthError> {
        let mut inner = self.inner.write().await;
        inner.check(StoreOperation::DeleteUser)?;

        let removed = inner
            .users
            .remove(user_id)
            .ok_or_else(|| AuthError::Store(format!("User '{}' not found", user_id)))?;
        inner.usernames.remove(&normalize_name(&removed.username));
        Ok(())
    }

    async fn add_user_role(&self, user_id: &str, role: &str) -> Result<(), AuthError> {
        let mut inner = self.inner.write().await;
        inner.check(StoreOperation::AddUserRole)?;

        let role_name = inner
            .roles
            .get(&normalize_name(role))
            .map(|(name, _)| name.clone())
            .ok_or_else(|| AuthError::Store(format!("Role '{}' does not exist", role)))?;
        inner.user_mut(user_id)?.roles.insert(role_name);
        Ok(())
    }

    async fn get_roles(&self, user_id: &str) -> Result<BTreeSet<String>, AuthError> {
        let inner = self.inner.read().await;
        inner.check(StoreOperation::GetRoles)?;
        Ok(inner.user(user_id)?.roles.clone())
    }

    async fn get_claims(&self, user_id: &str) -> Result<Vec<Claim>, AuthError> {
        let inner = self.inner.read().await;
        inner.check(StoreOperation::GetUserClaims)?;
        Ok(inner.user(user_id)?.claims.clone())
    }
}

#[async_trait::async_trait]
impl RoleStore for InMemoryStore {
    async fn role_exists(&self, name: &str) -> Result<bool, AuthError> {
        let inner = self.inner.read().await;
        inner.check(StoreOperation::RoleExists)?;
        Ok(inner.roles.contains_key(&normalize_name(name)))
    }

    async fn create_role(&self, name: &str) -> Result<(), AuthError> {
        let mut inner = self.inner.write().await;
        inner.check(StoreOperation::CreateRole)?;

        let key = normalize_name(name);
        if inner.roles.contains_key(&key) {
            return Err(AuthError::Store(format!("Role '{}' already exists", name)));
        }
        inner.roles.insert(key, (name.to_string(), Vec::new()));
        Ok(())
    }

    async fn get_claims(&self, role: &str) -> Result<Vec<Claim>, AuthError> {
        let inner = self.inner.read().await;
        inner.check(StoreOperation::GetRoleClaims)?;
        Ok(inner
            .roles
            .get(&normalize_name(role))
            .map(|(_, claims)| claims.clone())
            .unwrap_or_default())
    }

    fn supports_role_claims(&self) -> bool {
        self.role_claims_supported
    }
}
