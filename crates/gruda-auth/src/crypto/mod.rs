//! Password hashing and HS256 signing primitives.
//!
//! Nothing here reads the clock or the stores. Timing checks belong to the
//! token service; this module only hashes, signs and verifies bytes.

use crate::config::{MAX_BCRYPT_COST, MIN_BCRYPT_COST};
use crate::errors::{AuthError, TokenRejection};
use crate::observability::metrics::record_bcrypt_duration;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};
use std::time::Instant;
use tracing::instrument;

/// Bcrypt hash verified when the username is unknown, so that unknown and
/// known users cost the same.
pub const DUMMY_BCRYPT_HASH: &str =
    "$2b$12$LQv3c1yqBWVHxkd0LHAkCOYz6TtxMQJqhN8/LewY5GyYqExt7YD3a";

/// Hash a password with bcrypt.
///
/// # Errors
///
/// Returns `AuthError::Crypto` if the cost is outside 10-14 or hashing fails.
#[instrument(skip_all)]
pub fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cost) {
        return Err(AuthError::Crypto(format!(
            "Invalid bcrypt cost: {} (must be {}-{})",
            cost, MIN_BCRYPT_COST, MAX_BCRYPT_COST
        )));
    }

    let start = Instant::now();
    let result = bcrypt::hash(password, cost)
        .map_err(|e| AuthError::Crypto(format!("Password hashing failed: {}", e)));
    record_bcrypt_duration("hash", start.elapsed());
    result
}

/// Verify a password against a bcrypt hash.
#[instrument(skip_all)]
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let start = Instant::now();
    let result = bcrypt::verify(password, hash)
        .map_err(|e| AuthError::Crypto(format!("Password verification failed: {}", e)));
    record_bcrypt_duration("verify", start.elapsed());
    result
}

/// Burn one bcrypt verification against [`DUMMY_BCRYPT_HASH`].
#[instrument(skip_all)]
pub fn verify_dummy_password(password: &str) {
    if let Err(e) = verify_password(password, DUMMY_BCRYPT_HASH) {
        tracing::debug!(target: "gruda.crypto", error = %e, "Dummy bcrypt verification failed");
    }
}

/// Sign a JSON payload as a compact HS256 JWT.
///
/// The caller owns the payload; timing, issuer and audience must already be
/// in it.
#[instrument(skip_all)]
pub fn sign_hs256(payload: &Map<String, Value>, secret: &[u8]) -> Result<String, AuthError> {
    let mut header = Header::new(Algorithm::HS256);
    header.typ = Some("JWT".to_string());

    encode(&header, payload, &EncodingKey::from_secret(secret))
        .map_err(|e| AuthError::Crypto(format!("JWT signing operation failed: {}", e)))
}

/// Verify the HS256 signature of a compact JWT and return its payload.
///
/// Only the signature and JSON shape are checked. `exp`, `nbf`, `iss` and
/// `aud` are left to the caller, which evaluates them against an explicit
/// clock.
#[instrument(skip_all)]
pub fn verify_hs256(token: &str, secret: &[u8]) -> Result<Map<String, Value>, TokenRejection> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<Map<String, Value>>(token, &DecodingKey::from_secret(secret), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(target: "gruda.crypto", error = %e, "Token signature verification failed");
            match e.kind() {
                ErrorKind::InvalidSignature => TokenRejection::BadSignature,
                _ => TokenRejection::Malformed,
            }
        })
}
