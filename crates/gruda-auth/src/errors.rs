use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Generic message returned for every token rejection.
///
/// All rejection reasons collapse to this text on the wire so that callers
/// cannot use the API as a validation oracle.
pub const INVALID_TOKEN_MESSAGE: &str = "The access token is invalid or expired";

/// Generic message returned for every failed login.
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Could not verify username and password";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account locked out until {until}")]
    LockedOut { until: DateTime<Utc> },

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] TokenRejection),

    #[error("Store error: {0}")]
    Store(String),

    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("Internal server error")]
    Internal,
}

/// Reason a presented token was rejected, in validation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenRejection {
    #[error("malformed")]
    Malformed,
    #[error("bad_signature")]
    BadSignature,
    #[error("invalid_issuer")]
    InvalidIssuer,
    #[error("invalid_audience")]
    InvalidAudience,
    #[error("expired")]
    Expired,
    #[error("not_yet_valid")]
    NotYetValid,
}

impl TokenRejection {
    /// Bounded label for metrics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenRejection::Malformed => "malformed",
            TokenRejection::BadSignature => "bad_signature",
            TokenRejection::InvalidIssuer => "invalid_issuer",
            TokenRejection::InvalidAudience => "invalid_audience",
            TokenRejection::Expired => "expired",
            TokenRejection::NotYetValid => "not_yet_valid",
        }
    }
}

/// One role or user creation that failed during bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{subject}: {reason}")]
pub struct BootstrapFailure {
    /// What was being created, e.g. `role 'Admin'` or `admin user 'root'`.
    pub subject: String,
    pub reason: String,
}

/// Every failure collected during a bootstrap run. Always fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "Bootstrap failed with {} error(s): {}",
    .failures.len(),
    join_failures(.failures)
)]
pub struct BootstrapError {
    pub failures: Vec<BootstrapFailure>,
}

fn join_failures(failures: &[BootstrapFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl AuthError {
    /// HTTP status this error renders with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials
            | AuthError::LockedOut { .. }
            | AuthError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            AuthError::Configuration(_)
            | AuthError::Store(_)
            | AuthError::Bootstrap(_)
            | AuthError::Precondition(_)
            | AuthError::Crypto(_)
            | AuthError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (code, message) = match &self {
            AuthError::Validation(reason) => ("VALIDATION_ERROR", reason.clone()),
            AuthError::InvalidCredentials | AuthError::LockedOut { .. } => {
                ("INVALID_CREDENTIALS", INVALID_CREDENTIALS_MESSAGE.to_string())
            }
            AuthError::InvalidToken(_) => ("INVALID_TOKEN", INVALID_TOKEN_MESSAGE.to_string()),
            AuthError::Store(_) => (
                "STORE_ERROR",
                "An internal storage error occurred".to_string(),
            ),
            AuthError::Configuration(_)
            | AuthError::Bootstrap(_)
            | AuthError::Precondition(_)
            | AuthError::Crypto(_)
            | AuthError::Internal => ("INTERNAL_ERROR", "An internal error occurred".to_string()),
        };

        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(body)).into_response();
        if matches!(self, AuthError::InvalidToken(_)) {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer error=\"invalid_token\""),
            );
        }
        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body should collect")
            .to_bytes();
        serde_json::from_slice(&bytes).expect("body should be JSON")
    }

    #[tokio::test]
    async fn test_locked_out_is_indistinguishable_from_bad_credentials() {
        let locked = AuthError::LockedOut { until: Utc::now() }.into_response();
        let bad = AuthError::InvalidCredentials.into_response();

        assert_eq!(locked.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(bad.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(locked).await, body_json(bad).await);
    }

    #[tokio::test]
    async fn test_token_rejections_collapse_to_one_message() {
        for reason in [
            TokenRejection::Malformed,
            TokenRejection::BadSignature,
            TokenRejection::InvalidIssuer,
            TokenRejection::InvalidAudience,
            TokenRejection::Expired,
            TokenRejection::NotYetValid,
        ] {
            let response = AuthError::InvalidToken(reason).into_response();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));

            let body = body_json(response).await;
            assert_eq!(body["error"]["code"], "INVALID_TOKEN");
            assert_eq!(body["error"]["message"], INVALID_TOKEN_MESSAGE);
        }
    }

    #[tokio::test]
    async fn test_validation_error_is_bad_request_with_reason() {
        let response = AuthError::Validation("Username is required".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"]["message"], "Username is required");
    }

    #[tokio::test]
    async fn test_store_error_hides_details() {
        let response =
            AuthError::Store("connection refused to 10.0.0.5".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert!(!body.to_string().contains("10.0.0.5"));
    }

    #[test]
    fn test_bootstrap_error_lists_every_failure() {
        let err = BootstrapError {
            failures: vec![
                BootstrapFailure {
                    subject: "role 'Admin'".to_string(),
                    reason: "duplicate key".to_string(),
                },
                BootstrapFailure {
                    subject: "admin user 'root'".to_string(),
                    reason: "password too weak".to_string(),
                },
            ],
        };

        assert_eq!(
            err.to_string(),
            "Bootstrap failed with 2 error(s): role 'Admin': duplicate key; \
             admin user 'root': password too weak"
        );
        let wrapped = AuthError::from(err);
        assert!(matches!(wrapped, AuthError::Bootstrap(_)));
        assert!(wrapped.to_string().starts_with("Bootstrap failed"));
    }

    #[test]
    fn test_token_rejection_display_matches_label() {
        for reason in [
            TokenRejection::Malformed,
            TokenRejection::BadSignature,
            TokenRejection::InvalidIssuer,
            TokenRejection::InvalidAudience,
            TokenRejection::Expired,
            TokenRejection::NotYetValid,
        ] {
            assert_eq!(reason.to_string(), reason.as_str());

            let err = AuthError::from(reason);
            assert_eq!(err.to_string(), format!("Invalid token: {}", reason.as_str()));
            let source = std::error::Error::source(&err).map(ToString::to_string);
            assert_eq!(source.as_deref(), Some(reason.as_str()));
        }
    }
}
