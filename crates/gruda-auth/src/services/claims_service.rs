//! Claims aggregation.
//!
//! Builds the claim set for one token from the user snapshot, the user's
//! own claims and, when the role store supports it, the claims attached to
//! each of the user's roles. Role claims are read at issuance time.

use crate::errors::AuthError;
use crate::models::{
    Claim, ClaimSet, UserIdentity, CLAIM_ROLE, CLAIM_SUBJECT, CLAIM_TOKEN_ID, CLAIM_UNIQUE_NAME,
};
use crate::observability::hash_for_correlation;
use crate::repositories::{CredentialStore, RoleStore};
use tracing::instrument;
use uuid::Uuid;

/// Assemble the full claim set for `user`.
///
/// Order: `sub`, `unique_name`, `jti`, one `role` per role, each role's
/// attached claims, then the user's own claims. Exact duplicates are
/// emitted once. Claims whose type the issuer owns (`exp`, `iss`, ...) are
/// dropped.
///
/// # Errors
///
/// - `Precondition` if the user has an empty id or username
/// - `Store` if reading user or role claims fails
#[instrument(skip_all, name = "gruda.services.claims.aggregate")]
pub async fn aggregate_claims(
    user: &UserIdentity,
    credential_store: &dyn CredentialStore,
    role_store: &dyn RoleStore,
) -> Result<ClaimSet, AuthError> {
    if user.id.trim().is_empty() {
        return Err(AuthError::Precondition(
            "Cannot build claims for a user without an id".to_string(),
        ));
    }
    if user.username.trim().is_empty() {
        return Err(AuthError::Precondition(
            "Cannot build claims for a user without a username".to_string(),
        ));
    }

    let mut claims = ClaimSet::new();
    claims.push(Claim::new(CLAIM_SUBJECT, user.id.clone()));
    claims.push(Claim::new(CLAIM_UNIQUE_NAME, user.username.clone()));
    claims.push(Claim::new(CLAIM_TOKEN_ID, Uuid::new_v4().to_string()));

    for role in &user.roles {
        claims.push(Claim::new(CLAIM_ROLE, role.clone()));
    }

    if role_store.supports_role_claims() {
        for role in &user.roles {
            let role_claims = role_store.get_claims(role).await?;
            push_custom(&mut claims, role_claims, user);
        }
    }

    let user_claims = credential_store.get_claims(&user.id).await?;
    push_custom(&mut claims, user_claims, user);

    tracing::debug!(
        target: "gruda.services.claims",
        user = %hash_for_correlation(&user.id),
        claim_count = claims.len(),
        "Aggregated claims"
    );

    Ok(claims)
}

fn push_custom(claims: &mut ClaimSet, extra: Vec<Claim>, user: &UserIdentity) {
    for claim in extra {
        if claim.is_reserved() || is_identity_claim(&claim) {
            tracing::warn!(
                target: "gruda.services.claims",
                user = %hash_for_correlation(&user.id),
                claim_type = %claim.claim_type,
                "Dropping stored claim that would override an issuer-owned claim"
            );
            continue;
        }
        claims.push(claim);
    }
}

fn is_identity_claim(claim: &Claim) -> bool {
    matches!(
        claim.claim_type.as_str(),
        CLAIM_SUBJECT | CLAIM_UNIQUE_NAME | CLAIM_TOKEN_ID
    )
}
