//! Token issuance and validation (HS256 compact JWT).
//!
//! Issuance turns an aggregated [`ClaimSet`] plus timing, issuer and
//! audience into a signed token. Validation is pure: it takes the clock as
//! an argument and checks, in order, structure, signature, issuer,
//! audience and lifetime. The first failing check decides the
//! [`TokenRejection`].
//!
//! A claim type with one value is written as a JSON string; with several
//! values as a JSON array. The validator accepts both forms for every
//! claim, including `aud`.

use crate::config::SigningPolicy;
use crate::crypto;
use crate::errors::{AuthError, TokenRejection};
use crate::models::{
    AuthenticatedIdentity, Claim, ClaimSet, IssuedToken, CLAIM_ROLE, CLAIM_SUBJECT,
    CLAIM_TOKEN_ID, CLAIM_UNIQUE_NAME,
};
use crate::observability::metrics::{record_token_issuance, record_token_validation};
use chrono::{DateTime, Utc};
use common::jwt::{decode_payload_unverified, extract_alg};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

/// Registered claim names written by the issuer itself.
const REGISTERED_CLAIMS: [&str; 8] = [
    "iss",
    "aud",
    "exp",
    "nbf",
    "iat",
    CLAIM_SUBJECT,
    CLAIM_UNIQUE_NAME,
    CLAIM_TOKEN_ID,
];

/// Sign `claims` with the policy, using the current time.
pub fn issue_token(claims: &ClaimSet, policy: &SigningPolicy) -> Result<IssuedToken, AuthError> {
    issue_token_at(claims, policy, Utc::now())
}

/// Sign `claims` with the policy as of `now`.
///
/// `nbf` and `iat` are `now`, `exp` is `now + lifetime`, all truncated to
/// whole seconds.
///
/// # Errors
///
/// - `Configuration` if the secret is shorter than the algorithm minimum
/// - `Precondition` if the claim set lacks `sub`/`unique_name` or carries
///   an issuer-owned claim type
/// - `Crypto` if signing fails
#[instrument(skip_all, name = "gruda.services.token.issue")]
pub fn issue_token_at(
    claims: &ClaimSet,
    policy: &SigningPolicy,
    now: DateTime<Utc>,
) -> Result<IssuedToken, AuthError> {
    let start = Instant::now();
    let result = build_and_sign(claims, policy, now);

    let status = if result.is_ok() { "success" } else { "error" };
    record_token_issuance(status, start.elapsed());

    if let Err(e) = &result {
        tracing::warn!(target: "gruda.services.token", error = %e, "Token issuance failed");
    }
    result
}

fn build_and_sign(
    claims: &ClaimSet,
    policy: &SigningPolicy,
    now: DateTime<Utc>,
) -> Result<IssuedToken, AuthError> {
    policy.ensure_signing_key()?;

    if let Some(reserved) = claims.iter().find(|c| c.is_reserved()) {
        return Err(AuthError::Precondition(format!(
            "Claim set must not carry issuer-owned claim '{}'",
            reserved.claim_type
        )));
    }
    for required in [CLAIM_SUBJECT, CLAIM_UNIQUE_NAME] {
        if claims.first(required).map_or(true, str::is_empty) {
            return Err(AuthError::Precondition(format!(
                "Claim set is missing '{}'",
                required
            )));
        }
    }
    for single in [CLAIM_SUBJECT, CLAIM_UNIQUE_NAME, CLAIM_TOKEN_ID] {
        if claims.values_of(single).count() > 1 {
            return Err(AuthError::Precondition(format!(
                "Claim set carries more than one '{}'",
                single
            )));
        }
    }

    let mut payload = claims_to_payload(claims);
    let token_id = match payload.get(CLAIM_TOKEN_ID).and_then(Value::as_str) {
        Some(jti) => jti.to_string(),
        None => {
            let jti = Uuid::new_v4().to_string();
            payload.insert(CLAIM_TOKEN_ID.to_string(), Value::String(jti.clone()));
            jti
        }
    };

    let issued_at = now.timestamp();
    let expires = issued_at.saturating_add(policy.lifetime_seconds());
    payload.insert("nbf".to_string(), Value::from(issued_at));
    payload.insert("iat".to_string(), Value::from(issued_at));
    payload.insert("exp".to_string(), Value::from(expires));
    payload.insert("iss".to_string(), Value::String(policy.issuer.clone()));
    payload.insert("aud".to_string(), Value::String(policy.audience.clone()));

    let token = crypto::sign_hs256(&payload, policy.secret_key())?;

    let not_before = timestamp(issued_at).ok_or(AuthError::Internal)?;
    let expires_at = timestamp(expires).ok_or(AuthError::Internal)?;

    Ok(IssuedToken {
        token,
        token_id,
        not_before,
        expires_at,
        expires_in_seconds: policy.token_lifetime.as_secs(),
    })
}

/// Group claims by type, preserving first-appearance order of types.
fn claims_to_payload(claims: &ClaimSet) -> Map<String, Value> {
    let mut payload = Map::new();
    for claim in claims.iter() {
        let value = Value::String(claim.value.clone());
        match payload.get_mut(&claim.claim_type) {
            None => {
                payload.insert(claim.claim_type.clone(), value);
            }
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
        }
    }
    payload
}

/// Validate `token` against the policy, using the current time.
pub fn validate_token(
    token: &str,
    policy: &SigningPolicy,
) -> Result<AuthenticatedIdentity, TokenRejection> {
    validate_token_at(token, policy, Utc::now())
}

/// Validate `token` against the policy as of `now`.
///
/// Zero clock skew: the token is usable from `nbf` inclusive until `exp`
/// exclusive.
#[instrument(skip_all, name = "gruda.services.token.validate")]
pub fn validate_token_at(
    token: &str,
    policy: &SigningPolicy,
    now: DateTime<Utc>,
) -> Result<AuthenticatedIdentity, TokenRejection> {
    let result = check_token(token, policy, now);

    match &result {
        Ok(_) => record_token_validation("success", None),
        Err(reason) => {
            tracing::debug!(
                target: "gruda.services.token",
                reason = reason.as_str(),
                "Token rejected"
            );
            record_token_validation("error", Some(reason.as_str()));
        }
    }
    result
}

fn check_token(
    token: &str,
    policy: &SigningPolicy,
    now: DateTime<Utc>,
) -> Result<AuthenticatedIdentity, TokenRejection> {
    // 1. Structure
    let alg = extract_alg(token).map_err(|_| TokenRejection::Malformed)?;
    if alg != policy.algorithm.as_str() {
        return Err(TokenRejection::Malformed);
    }
    decode_payload_unverified(token).map_err(|_| TokenRejection::Malformed)?;

    // 2. Signature
    let payload = crypto::verify_hs256(token, policy.secret_key())?;

    // 3. Issuer
    if payload.get("iss").and_then(Value::as_str) != Some(policy.issuer.as_str()) {
        return Err(TokenRejection::InvalidIssuer);
    }

    // 4. Audience
    if !string_values(payload.get("aud")).any(|aud| aud == policy.audience) {
        return Err(TokenRejection::InvalidAudience);
    }

    // 5. Lifetime
    let not_before = numeric_date(&payload, "nbf")?;
    let expires = numeric_date(&payload, "exp")?;
    let now_secs = now.timestamp();
    if now_secs < not_before {
        return Err(TokenRejection::NotYetValid);
    }
    if now_secs >= expires {
        return Err(TokenRejection::Expired);
    }

    let subject = required_string(&payload, CLAIM_SUBJECT)?;
    let unique_name = required_string(&payload, CLAIM_UNIQUE_NAME)?;
    let token_id = payload
        .get(CLAIM_TOKEN_ID)
        .and_then(Value::as_str)
        .map(ToString::to_string);

    let roles: BTreeSet<String> = string_values(payload.get(CLAIM_ROLE))
        .map(ToString::to_string)
        .collect();

    let claims = payload
        .iter()
        .filter(|(name, _)| !REGISTERED_CLAIMS.contains(&name.as_str()))
        .flat_map(|(name, value)| {
            scalar_values(value).map(move |v| Claim::new(name.clone(), v))
        })
        .collect();

    Ok(AuthenticatedIdentity {
        subject,
        unique_name,
        token_id,
        roles,
        claims,
        not_before: timestamp(not_before).ok_or(TokenRejection::Malformed)?,
        expires_at: timestamp(expires).ok_or(TokenRejection::Malformed)?,
    })
}

fn timestamp(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

/// A JWT NumericDate. Fractional seconds are truncated.
fn numeric_date(payload: &Map<String, Value>, name: &str) -> Result<i64, TokenRejection> {
    let value = payload.get(name).ok_or(TokenRejection::Malformed)?;
    value
        .as_i64()
        .or_else(|| {
            value
                .as_f64()
                .filter(|f| f.is_finite())
                .map(|f| f.trunc() as i64)
        })
        .ok_or(TokenRejection::Malformed)
}

fn required_string(payload: &Map<String, Value>, name: &str) -> Result<String, TokenRejection> {
    payload
        .get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(TokenRejection::Malformed)
}

/// String members of a claim that may be a string or an array of strings.
fn string_values(value: Option<&Value>) -> impl Iterator<Item = &str> {
    let (single, many) = match value {
        Some(Value::String(s)) => (Some(s.as_str()), None),
        Some(Value::Array(values)) => (None, Some(values.iter().filter_map(Value::as_str))),
        _ => (None, None),
    };
    single.into_iter().chain(many.into_iter().flatten())
}

/// Scalar members of a custom claim rendered as strings.
fn scalar_values(value: &Value) -> Box<dyn Iterator<Item = String> + '_> {
    match value {
        Value::String(s) => Box::new(std::iter::once(s.clone())),
        Value::Array(values) => Box::new(values.iter().flat_map(scalar_values)),
        Value::Number(n) => Box::new(std::iter::once(n.to_string())),
        Value::Bool(b) => Box::new(std::iter::once(b.to_string())),
        Value::Null | Value::Object(_) => Box::new(std::iter::empty()),
    }
}
