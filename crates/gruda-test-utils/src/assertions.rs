//! Custom test assertions for issued tokens.
//!
//! These inspect the token payload without verifying the signature; pair
//! them with a validation call when the signature matters.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

fn payload(token: &str) -> serde_json::Map<String, Value> {
    let parts: Vec<_> = token.split('.').collect();
    let payload = URL_SAFE_NO_PAD
        .decode(parts[1])
        .expect("Invalid JWT payload");
    serde_json::from_slice(&payload).expect("Failed to parse JWT claims")
}

fn string_values(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// Custom assertions for issued tokens
///
/// # Example
/// ```rust,ignore
/// token
///     .assert_valid_jwt()
///     .assert_for_subject(&user.id)
///     .assert_has_role("Admin")
///     .assert_lifetime(1200);
/// ```
pub trait TokenAssertions {
    /// Assert three segments, an HS256 `JWT` header and a JSON payload
    fn assert_valid_jwt(&self) -> &Self;

    fn assert_for_subject(&self, subject: &str) -> &Self;

    fn assert_unique_name(&self, unique_name: &str) -> &Self;

    /// Assert a `role` value, whether serialized as a string or an array
    fn assert_has_role(&self, role: &str) -> &Self;

    fn assert_lacks_role(&self, role: &str) -> &Self;

    /// Assert `exp - nbf` in seconds
    fn assert_lifetime(&self, seconds: i64) -> &Self;

    /// Assert `iss` and `aud`
    fn assert_issued_for(&self, issuer: &str, audience: &str) -> &Self;
}

impl TokenAssertions for String {
    fn assert_valid_jwt(&self) -> &Self {
        let parts: Vec<_> = self.split('.').collect();
        assert_eq!(
            parts.len(),
            3,
            "JWT must have 3 parts (header.payload.signature), got {}",
            parts.len()
        );

        let header_bytes = URL_SAFE_NO_PAD
            .decode(parts[0])
            .expect("Failed to base64 decode JWT header");
        let header: JwtHeader =
            serde_json::from_slice(&header_bytes).expect("Failed to parse JWT header JSON");
        assert_eq!(header.alg, "HS256", "Expected HS256 algorithm");
        assert_eq!(header.typ, "JWT", "Expected JWT type");

        let _ = payload(self);
        assert!(!parts[2].is_empty(), "JWT signature is empty");

        self
    }

    fn assert_for_subject(&self, subject: &str) -> &Self {
        let claims = payload(self);
        assert_eq!(
            claims.get("sub").and_then(Value::as_str),
            Some(subject),
            "Unexpected subject"
        );
        self
    }

    fn assert_unique_name(&self, unique_name: &str) -> &Self {
        let claims = payload(self);
        assert_eq!(
            claims.get("unique_name").and_then(Value::as_str),
            Some(unique_name),
            "Unexpected unique_name"
        );
        self
    }

    fn assert_has_role(&self, role: &str) -> &Self {
        let roles = string_values(payload(self).get("role"));
        assert!(
            roles.iter().any(|r| r == role),
            "Token does not contain role '{}'. Roles: {:?}",
            role,
            roles
        );
        self
    }

    fn assert_lacks_role(&self, role: &str) -> &Self {
        let roles = string_values(payload(self).get("role"));
        assert!(
            !roles.iter().any(|r| r == role),
            "Token unexpectedly contains role '{}'",
            role
        );
        self
    }

    fn assert_lifetime(&self, seconds: i64) -> &Self {
        let claims = payload(self);
        let nbf = claims.get("nbf").and_then(Value::as_i64).expect("nbf missing");
        let exp = claims.get("exp").and_then(Value::as_i64).expect("exp missing");
        assert_eq!(exp - nbf, seconds, "Unexpected token lifetime");
        self
    }

    fn assert_issued_for(&self, issuer: &str, audience: &str) -> &Self {
        let claims = payload(self);
        assert_eq!(claims.get("iss").and_then(Value::as_str), Some(issuer));
        assert!(
            string_values(claims.get("aud")).iter().any(|a| a == audience),
            "Token audience does not include '{}'",
            audience
        );
        self
    }
}
