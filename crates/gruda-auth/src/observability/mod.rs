//! Observability helpers for the Gruda auth service.
//!
//! # Privacy by Default
//!
//! All instrumentation uses `#[instrument(skip_all)]` and explicit safe field
//! allow-listing. Fields are categorized as:
//! - **SAFE**: Can be logged in plaintext (enums, outcomes, rejection reasons)
//! - **HASHED**: Must be SHA-256 hashed for correlation (username, user id)
//! - **NEVER**: Must never appear in logs (passwords, tokens, signing secret)

pub mod metrics;

use crate::errors::AuthError;
use sha2::{Digest, Sha256};

/// Hash a field value for correlation in logs (SHA-256, first 8 hex chars).
///
/// Used for usernames and user ids, which need correlation across log
/// entries but should not be stored in plaintext.
pub fn hash_for_correlation(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    digest
        .iter()
        .take(4)
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Error categories for metrics labels (bounded cardinality).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad credentials, lockout, rejected tokens
    Authentication,
    /// Malformed requests and policy violations
    Validation,
    /// Signing and hashing failures
    Cryptographic,
    /// Store, configuration and bootstrap failures
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Cryptographic => "cryptographic",
            ErrorCategory::Internal => "internal",
        }
    }
}

impl From<&AuthError> for ErrorCategory {
    fn from(err: &AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials
            | AuthError::LockedOut { .. }
            | AuthError::InvalidToken(_) => ErrorCategory::Authentication,
            AuthError::Validation(_) => ErrorCategory::Validation,
            AuthError::Crypto(_) => ErrorCategory::Cryptographic,
            AuthError::Configuration(_)
            | AuthError::Store(_)
            | AuthError::Bootstrap(_)
            | AuthError::Precondition(_)
            | AuthError::Internal => ErrorCategory::Internal,
        }
    }
}
