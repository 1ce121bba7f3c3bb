use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Subject claim (user id).
pub const CLAIM_SUBJECT: &str = "sub";
/// Unique-name claim (username).
pub const CLAIM_UNIQUE_NAME: &str = "unique_name";
/// Token id claim.
pub const CLAIM_TOKEN_ID: &str = "jti";
/// Role claim, one per role.
pub const CLAIM_ROLE: &str = "role";

/// Claim types owned by the token issuer. A claim set may not carry them.
pub const RESERVED_CLAIM_TYPES: [&str; 5] = ["iss", "aud", "exp", "nbf", "iat"];

/// Snapshot of a user as read from the credential store.
#[derive(Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub id: String,
    pub username: String,
    pub email: String,
    pub created_on: DateTime<Utc>,
    pub roles: BTreeSet<String>,
}

/// Custom Debug implementation that redacts the email address.
impl fmt::Debug for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserIdentity")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &"[REDACTED]")
            .field("created_on", &self.created_on)
            .field("roles", &self.roles)
            .finish()
    }
}

/// Fields for a user the core asks the store to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
}

/// A typed assertion about the token subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Claim {
    #[serde(rename = "type")]
    pub claim_type: String,
    pub value: String,
}

impl Claim {
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
        }
    }

    pub fn is_reserved(&self) -> bool {
        RESERVED_CLAIM_TYPES.contains(&self.claim_type.as_str())
    }
}

/// Ordered claims assembled for a single token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimSet {
    claims: Vec<Claim>,
}

impl ClaimSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a claim unless an identical one is already present.
    pub fn push(&mut self, claim: Claim) {
        if !self.claims.contains(&claim) {
            self.claims.push(claim);
        }
    }

    pub fn extend<I: IntoIterator<Item = Claim>>(&mut self, claims: I) {
        for claim in claims {
            self.push(claim);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Claim> {
        self.claims.iter()
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// First value of a claim type.
    pub fn first(&self, claim_type: &str) -> Option<&str> {
        self.claims
            .iter()
            .find(|c| c.claim_type == claim_type)
            .map(|c| c.value.as_str())
    }

    /// All values of a claim type, in insertion order.
    pub fn values_of<'a>(&'a self, claim_type: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.claims
            .iter()
            .filter(move |c| c.claim_type == claim_type)
            .map(|c| c.value.as_str())
    }

    pub fn contains(&self, claim_type: &str, value: &str) -> bool {
        self.claims
            .iter()
            .any(|c| c.claim_type == claim_type && c.value == value)
    }
}

impl IntoIterator for ClaimSet {
    type Item = Claim;
    type IntoIter = std::vec::IntoIter<Claim>;

    fn into_iter(self) -> Self::IntoIter {
        self.claims.into_iter()
    }
}

/// Per-user lockout counters held by the credential store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockoutState {
    pub failed_attempt_count: u32,
    pub locked_until: Option<DateTime<Utc>>,
}

impl LockoutState {
    /// True while `now` is before the lockout end.
    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.locked_until, Some(until) if now < until)
    }
}

/// Result of a compare-and-set lockout update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockoutUpdate {
    Updated,
    /// The stored state no longer matched the expected state.
    Conflict,
}

/// A freshly signed token.
#[derive(Clone)]
pub struct IssuedToken {
    pub token: String,
    pub token_id: String,
    pub not_before: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub expires_in_seconds: u64,
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("token", &"[REDACTED]")
            .field("token_id", &self.token_id)
            .field("not_before", &self.not_before)
            .field("expires_at", &self.expires_at)
            .field("expires_in_seconds", &self.expires_in_seconds)
            .finish()
    }
}

/// Identity view built from a validated token.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthenticatedIdentity {
    pub subject: String,
    pub unique_name: String,
    pub token_id: Option<String>,
    pub roles: BTreeSet<String>,
    /// Every non-standard claim in the token, including roles.
    pub claims: Vec<Claim>,
    pub not_before: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AuthenticatedIdentity {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn claim_values<'a>(&'a self, claim_type: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.claims
            .iter()
            .filter(move |c| c.claim_type == claim_type)
            .map(|c| c.value.as_str())
    }
}

/// Custom Debug implementation that redacts the subject.
impl fmt::Debug for AuthenticatedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedIdentity")
            .field("subject", &"[REDACTED]")
            .field("unique_name", &self.unique_name)
            .field("token_id", &self.token_id)
            .field("roles", &self.roles)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Login response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

impl From<IssuedToken> for TokenResponse {
    fn from(issued: IssuedToken) -> Self {
        Self {
            access_token: issued.token,
            token_type: "Bearer".to_string(),
            expires_in: issued.expires_in_seconds,
        }
    }
}
