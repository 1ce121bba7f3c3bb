//! Bearer token middleware for protected routes.
//!
//! Extracts the token from the `Authorization` header, validates it against
//! the signing policy and injects the resulting
//! [`AuthenticatedIdentity`](crate::models::AuthenticatedIdentity) into
//! request extensions, where handlers read it with `Extension`.

use crate::config::SigningPolicy;
use crate::errors::{AuthError, TokenRejection};
use crate::services::token_service;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub signing: SigningPolicy,
}

fn extract_bearer_token(req: &Request) -> Result<&str, AuthError> {
    let auth_header = req
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "gruda.middleware.auth", "Missing Authorization header");
            AuthError::InvalidToken(TokenRejection::Malformed)
        })?;

    auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        tracing::debug!(target: "gruda.middleware.auth", "Invalid Authorization header format");
        AuthError::InvalidToken(TokenRejection::Malformed)
    })
}

/// Reject the request with 401 unless it carries a valid bearer token.
#[instrument(skip_all, name = "gruda.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, AuthError> {
    let token = extract_bearer_token(&req)?;

    let identity = token_service::validate_token(token, &state.signing).map_err(|reason| {
        tracing::debug!(target: "gruda.middleware.auth", reason = %reason, "Token rejected");
        AuthError::InvalidToken(reason)
    })?;

    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}
