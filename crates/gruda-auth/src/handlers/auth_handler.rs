use crate::errors::AuthError;
use crate::models::{AuthenticatedIdentity, TokenResponse};
use crate::routes::AppState;
use crate::services::login_service;
use axum::{extract::State, Extension, Json};
use common::secret::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: SecretString,
}

/// Identity echoed back by the identity endpoint.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthTestResponse {
    pub user_name: String,
    pub id: String,
    pub roles: Vec<String>,
}

/// Handle password login
///
/// POST /api/account/login
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AuthError> {
    let issued = login_service::login(
        state.credential_store.as_ref(),
        state.role_store.as_ref(),
        &state.config,
        &payload.username,
        payload.password.expose_secret(),
    )
    .await?;

    Ok(Json(TokenResponse::from(issued)))
}

/// Echo the identity carried by the presented bearer token
///
/// GET /api/authtest
pub async fn handle_authtest(
    Extension(identity): Extension<AuthenticatedIdentity>,
) -> Json<AuthTestResponse> {
    Json(AuthTestResponse {
        user_name: identity.unique_name,
        id: identity.subject,
        roles: identity.roles.into_iter().collect(),
    })
}
