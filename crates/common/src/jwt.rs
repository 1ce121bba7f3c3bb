//! JWT structural utilities shared across Gruda components.
//!
//! These helpers look at the *shape* of a compact JWT only: its size, its
//! three base64url segments, and the JSON inside the header and payload.
//! None of them verify a signature. Callers must run signature verification
//! before trusting anything decoded here.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE any decoding (DoS prevention)
//! - Error messages are generic; details go to `debug` level logs
//!
//! # Usage
//!
//! ```rust
//! use common::jwt::{decode_header, MAX_JWT_SIZE_BYTES};
//!
//! // header {"alg":"HS256","typ":"JWT"}
//! let token = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.e30.c2ln";
//! assert!(token.len() <= MAX_JWT_SIZE_BYTES);
//! let header = decode_header(token).unwrap();
//! assert_eq!(header["alg"], "HS256");
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::{Map, Value};
use thiserror::Error;

/// Maximum allowed JWT size in bytes (8KB).
///
/// A login token carries identity, a handful of role claims and any
/// role-attached claims; 8KB leaves ample room while rejecting oversized
/// input before base64 decoding or HMAC computation.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// Errors raised while inspecting the structure of a JWT.
///
/// Messages are intentionally generic to prevent information leakage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtStructureError {
    /// Token size exceeds [`MAX_JWT_SIZE_BYTES`].
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token is not three base64url segments of JSON.
    #[error("The access token is invalid or expired")]
    MalformedToken,
}

/// The three raw (still base64url encoded) segments of a compact JWT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSegments<'a> {
    pub header: &'a str,
    pub payload: &'a str,
    pub signature: &'a str,
}

/// Split a compact JWT into its segments after checking its size.
///
/// # Errors
///
/// - `TokenTooLarge` if the token exceeds [`MAX_JWT_SIZE_BYTES`]
/// - `MalformedToken` if it does not have exactly three non-empty segments
pub fn split_token(token: &str) -> Result<TokenSegments<'_>, JwtStructureError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtStructureError::TokenTooLarge);
    }

    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(payload), Some(signature), None)
            if !header.is_empty() && !payload.is_empty() && !signature.is_empty() =>
        {
            Ok(TokenSegments {
                header,
                payload,
                signature,
            })
        }
        _ => {
            tracing::debug!(target: "common.jwt", "Token rejected: invalid JWT format");
            Err(JwtStructureError::MalformedToken)
        }
    }
}

/// Decode one base64url segment into a JSON object.
fn decode_segment(segment: &str) -> Result<Map<String, Value>, JwtStructureError> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT segment base64");
        JwtStructureError::MalformedToken
    })?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => {
            tracing::debug!(target: "common.jwt", "JWT segment is not a JSON object");
            Err(JwtStructureError::MalformedToken)
        }
        Err(e) => {
            tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT segment JSON");
            Err(JwtStructureError::MalformedToken)
        }
    }
}

/// Decode the JOSE header of a JWT without verifying it.
///
/// # Errors
///
/// Returns `JwtStructureError` if the token is oversized or malformed.
pub fn decode_header(token: &str) -> Result<Map<String, Value>, JwtStructureError> {
    let segments = split_token(token)?;
    decode_segment(segments.header)
}

/// Decode the payload of a JWT without verifying the signature.
///
/// Only for inspection after verification, or for tests and tooling.
///
/// # Errors
///
/// Returns `JwtStructureError` if the token is oversized or malformed.
pub fn decode_payload_unverified(token: &str) -> Result<Map<String, Value>, JwtStructureError> {
    let segments = split_token(token)?;
    decode_segment(segments.payload)
}

/// Extract the `alg` header value.
///
/// # Errors
///
/// Returns `MalformedToken` if the header has no string `alg`.
pub fn extract_alg(token: &str) -> Result<String, JwtStructureError> {
    decode_header(token)?
        .get("alg")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(JwtStructureError::MalformedToken)
}
