//! Postgres-backed role store (`roles` and `role_claims` tables).

use super::{normalize_name, RoleStore};
use crate::errors::AuthError;
use crate::models::Claim;
use sqlx::PgPool;

#[derive(Clone)]
pub struct PgRoleStore {
    pool: PgPool,
}

impl PgRoleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RoleStore for PgRoleStore {
    async fn role_exists(&self, name: &str) -> Result<bool, AuthError> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM roles WHERE normalized_name = $1)")
                .bind(normalize_name(name))
                .fetch_one(&self.pool)
                .await
                .map_err(|e| AuthError::Store(format!("Failed to check role: {}", e)))?;
        Ok(exists)
    }

    async fn create_role(&self, name: &str) -> Result<(), AuthError> {
        sqlx::query("INSERT INTO roles (name, normalized_name) VALUES ($1, $2)")
            .bind(name)
            .bind(normalize_name(name))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if e.to_string().contains("roles_normalized_name_key") {
                    AuthError::Store(format!("Role '{}' already exists", name))
                } else {
                    AuthError::Store(format!("Failed to create role: {}", e))
                }
            })?;
        Ok(())
    }

    async fn get_claims(&self, role: &str) -> Result<Vec<Claim>, AuthError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT rc.claim_type, rc.claim_value
            FROM role_claims rc
            JOIN roles r ON r.name = rc.role_name
            WHERE r.normalized_name = $1
            ORDER BY rc.claim_id
            "#,
        )
        .bind(normalize_name(role))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AuthError::Store(format!("Failed to fetch role claims: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|(claim_type, value)| Claim { claim_type, value })
            .collect())
    }

    fn supports_role_claims(&self) -> bool {
        true
    }
}
