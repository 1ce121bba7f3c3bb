//! Builders for crafting tokens the issuer would never produce.
//!
//! Used to exercise every validator rejection path: wrong issuer or
//! audience, shifted validity windows, other algorithms, foreign keys and
//! missing identity claims.

use crate::fixtures::{TEST_AUDIENCE, TEST_ISSUER, TEST_SIGNING_SECRET, TEST_TOKEN_LIFETIME_SECONDS};
use crate::test_ids::{TEST_TOKEN_ID_1, TEST_USER_ALICE};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Map, Value};

/// Builder for HMAC-signed test tokens
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .for_user("u1", "alice")
///     .with_role("Admin")
///     .issuer("someone-else")
///     .sign();
/// ```
pub struct TestTokenBuilder {
    algorithm: Algorithm,
    secret: Vec<u8>,
    claims: Map<String, Value>,
}

impl TestTokenBuilder {
    /// Token valid right now for the test policy, for alice
    /// ([`TEST_USER_ALICE`]) with token id [`TEST_TOKEN_ID_1`].
    pub fn new() -> Self {
        let now = Utc::now().timestamp();
        let lifetime = i64::try_from(TEST_TOKEN_LIFETIME_SECONDS).unwrap_or(i64::MAX);

        let mut claims = Map::new();
        claims.insert("sub".into(), json!(TEST_USER_ALICE.to_string()));
        claims.insert("unique_name".into(), json!("alice"));
        claims.insert("jti".into(), json!(TEST_TOKEN_ID_1.to_string()));
        claims.insert("iss".into(), json!(TEST_ISSUER));
        claims.insert("aud".into(), json!(TEST_AUDIENCE));
        claims.insert("nbf".into(), json!(now));
        claims.insert("iat".into(), json!(now));
        claims.insert("exp".into(), json!(now + lifetime));

        Self {
            algorithm: Algorithm::HS256,
            secret: TEST_SIGNING_SECRET.to_vec(),
            claims,
        }
    }

    /// Set `sub` and `unique_name`
    pub fn for_user(mut self, subject: &str, unique_name: &str) -> Self {
        self.claims.insert("sub".into(), json!(subject));
        self.claims.insert("unique_name".into(), json!(unique_name));
        self
    }

    /// Add a role; a second role turns `role` into an array
    pub fn with_role(self, role: &str) -> Self {
        self.with_claim_value("role", role)
    }

    /// Add one value of a custom claim, string for one value, array for more
    pub fn with_claim_value(mut self, claim_type: &str, value: &str) -> Self {
        let merged = match self.claims.remove(claim_type) {
            None => json!(value),
            Some(Value::Array(mut values)) => {
                values.push(json!(value));
                Value::Array(values)
            }
            Some(existing) => json!([existing, value]),
        };
        self.claims.insert(claim_type.to_string(), merged);
        self
    }

    /// Set any claim to an arbitrary JSON value
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    /// Remove a claim entirely
    pub fn without_claim(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    pub fn issuer(self, issuer: &str) -> Self {
        self.with_claim("iss", json!(issuer))
    }

    pub fn audience(self, audience: &str) -> Self {
        self.with_claim("aud", json!(audience))
    }

    /// Set `aud` to a JSON array
    pub fn audiences(self, audiences: &[&str]) -> Self {
        self.with_claim("aud", json!(audiences))
    }

    /// Set `nbf` and `exp` as Unix seconds
    pub fn valid_between(self, not_before: i64, expires_at: i64) -> Self {
        self.with_claim("nbf", json!(not_before))
            .with_claim("exp", json!(expires_at))
    }

    /// Sign with another HMAC algorithm
    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Sign with another secret
    pub fn signed_with(mut self, secret: &[u8]) -> Self {
        self.secret = secret.to_vec();
        self
    }

    /// The payload that will be signed
    pub fn build(&self) -> Value {
        Value::Object(self.claims.clone())
    }

    /// Sign and serialize to compact form
    pub fn sign(self) -> String {
        encode(
            &Header::new(self.algorithm),
            &self.claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .expect("test token should encode")
    }

    /// Serialize with `alg: none` and an empty signature
    pub fn unsigned(self) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD
            .encode(serde_json::to_vec(&self.claims).expect("claims should serialize"));
        format!("{}.{}.", header, payload)
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Flip one byte of the signature while keeping valid base64url.
pub fn tamper_signature(token: &str) -> String {
    let (signed, signature) = token.rsplit_once('.').expect("token should have a signature");
    let mut bytes = URL_SAFE_NO_PAD
        .decode(signature)
        .expect("signature should be base64url");
    let first = bytes.first_mut().expect("signature should not be empty");
    *first ^= 0x01;
    format!("{}.{}", signed, URL_SAFE_NO_PAD.encode(bytes))
}
