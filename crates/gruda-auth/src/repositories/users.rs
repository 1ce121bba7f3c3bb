//! Postgres-backed credential store.
//!
//! Users, their role grants and their claims live in the `users`,
//! `user_roles` and `user_claims` tables. Lockout counters are columns on
//! `users` and change only through a single conditional `UPDATE`.

use super::{normalize_name, CredentialStore};
use crate::crypto;
use crate::errors::AuthError;
use crate::models::{Claim, LockoutState, LockoutUpdate, NewUser, UserIdentity};
use chrono::{DateTime, Utc};
use common::secret::{ExposeSecret, SecretString};
use sqlx::PgPool;
use std::collections::BTreeSet;
use uuid::Uuid;

/// User row (maps to users table, without the password hash).
#[derive(Debug, Clone, sqlx::FromRow)]
struct UserRow {
    user_id: Uuid,
    username: String,
    email: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, sqlx::FromRow)]
struct LockoutRow {
    failed_attempts: i32,
    lockout_end: Option<DateTime<Utc>>,
}

impl TryFrom<LockoutRow> for LockoutState {
    type Error = AuthError;

    fn try_from(row: LockoutRow) -> Result<Self, Self::Error> {
        let failed_attempt_count = u32::try_from(row.failed_attempts).map_err(|_| {
            AuthError::Store(format!(
                "Negative failed attempt count: {}",
                row.failed_attempts
            ))
        })?;
        Ok(LockoutState {
            failed_attempt_count,
            locked_until: row.lockout_end,
        })
    }
}

fn parse_user_id(user_id: &str) -> Result<Uuid, AuthError> {
    Uuid::parse_str(user_id).map_err(|_| AuthError::Store(format!("Invalid user id: {}", user_id)))
}

fn attempts_column(count: u32) -> Result<i32, AuthError> {
    i32::try_from(count)
        .map_err(|_| AuthError::Store(format!("Failed attempt count out of range: {}", count)))
}

/// [`CredentialStore`] over a Postgres pool.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
    bcrypt_cost: u32,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool, bcrypt_cost: u32) -> Self {
        Self { pool, bcrypt_cost }
    }

    async fn roles_for(&self, user_id: Uuid) -> Result<BTreeSet<String>, AuthError> {
        let roles: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT role_name
            FROM user_roles
            WHERE user_id = $1
            ORDER BY role_name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AuthError::Store(format!("Failed to fetch user roles: {}", e)))?;

        Ok(roles.into_iter().map(|(role,)| role).collect())
    }
}

#[async_trait::async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserIdentity>, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT user_id, username, email, created_at
            FROM users
            WHERE normalized_username = $1
            "#,
        )
        .bind(normalize_name(username))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::Store(format!("Failed to fetch user by username: {}", e)))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let roles = self.roles_for(row.user_id).await?;
        Ok(Some(UserIdentity {
            id: row.user_id.to_string(),
            username: row.username,
            email: row.email,
            created_on: row.created_at,
            roles,
        }))
    }

    async fn verify_password(&self, user_id: &str, password: &str) -> Result<bool, AuthError> {
        let id = parse_user_id(user_id)?;
        let hash: Option<(String,)> =
            sqlx::query_as("SELECT password_hash FROM users WHERE user_id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| AuthError::Store(format!("Failed to fetch password hash: {}", e)))?;

        let (hash,) = hash.ok_or_else(|| AuthError::Store(format!("User '{}' not found", id)))?;
        crypto::verify_password(password, &hash)
    }

    async fn get_lockout_state(&self, user_id: &str) -> Result<LockoutState, AuthError> {
        let id = parse_user_id(user_id)?;
        let row = sqlx::query_as::<_, LockoutRow>(
            "SELECT failed_attempts, lockout_end FROM users WHERE user_id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::Store(format!("Failed to fetch lockout state: {}", e)))?
        .ok_or_else(|| AuthError::Store(format!("User '{}' not found", id)))?;

        LockoutState::try_from(row)
    }

    async fn update_lockout_state(
        &self,
        user_id: &str,
        expected: LockoutState,
        new: LockoutState,
    ) -> Result<LockoutUpdate, AuthError> {
        let id = parse_user_id(user_id)?;
        let result = sqlx::query(
            r#"
            UPDATE users
            SET failed_attempts = $4, lockout_end = $5
            WHERE user_id = $1
              AND failed_attempts = $2
              AND lockout_end IS NOT DISTINCT FROM $3
            "#,
        )
        .bind(id)
        .bind(attempts_column(expected.failed_attempt_count)?)
        .bind(expected.locked_until)
        .bind(attempts_column(new.failed_attempt_count)?)
        .bind(new.locked_until)
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::Store(format!("Failed to update lockout state: {}", e)))?;

        if result.rows_affected() == 1 {
            Ok(LockoutUpdate::Updated)
        } else {
            Ok(LockoutUpdate::Conflict)
        }
    }

    async fn create_user(
        &self,
        user: &NewUser,
        password: &SecretString,
    ) -> Result<UserIdentity, AuthError> {
        let password_hash = crypto::hash_password(password.expose_secret(), self.bcrypt_cost)?;

        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (username, normalized_username, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING user_id, username, email, created_at
            "#,
        )
        .bind(&user.username)
        .bind(normalize_name(&user.username))
        .bind(&user.email)
        .bind(&password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if e.to_string().contains("users_normalized_username_key") {
                AuthError::Store(format!("User '{}' already exists", user.username))
            } else {
                AuthError::Store(format!("Failed to create user: {}", e))
            }
        })?;

        Ok(UserIdentity {
            id: row.user_id.to_string(),
            username: row.username,
            email: row.email,
            created_on: row.created_at,
            roles: BTreeSet::new(),
        })
    }

    async fn delete_user(&self, user_id: &str) -> Result<(), AuthError> {
        let id = parse_user_id(user_id)?;
        let result = sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Store(format!("Failed to delete user: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(AuthError::Store(format!("User '{}' not found", id)));
        }
        Ok(())
    }

    async fn add_user_role(&self, user_id: &str, role: &str) -> Result<(), AuthError> {
        let id = parse_user_id(user_id)?;
        let result = sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_name)
            SELECT $1, name FROM roles WHERE normalized_name = $2
            ON CONFLICT (user_id, role_name) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(normalize_name(role))
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::Store(format!("Failed to add user role: {}", e)))?;

        if result.rows_affected() == 0 {
            // Either already granted or the role is missing.
            let exists: (bool,) = sqlx::query_as(
                "SELECT EXISTS(SELECT 1 FROM roles WHERE normalized_name = $1)",
            )
            .bind(normalize_name(role))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AuthError::Store(format!("Failed to check role: {}", e)))?;
            if !exists.0 {
                return Err(AuthError::Store(format!("Role '{}' does not exist", role)));
            }
        }
        Ok(())
    }

    async fn get_roles(&self, user_id: &str) -> Result<BTreeSet<String>, AuthError> {
        self.roles_for(parse_user_id(user_id)?).await
    }

    async fn get_claims(&self, user_id: &str) -> Result<Vec<Claim>, AuthError> {
        let id = parse_user_id(user_id)?;
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT claim_type, claim_value
            FROM user_claims
            WHERE user_id = $1
            ORDER BY claim_id
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AuthError::Store(format!("Failed to fetch user claims: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|(claim_type, value)| Claim { claim_type, value })
            .collect())
    }
}
