use crate::errors::AuthError;
use common::secret::{ExposeSecret, SecretBox, SecretString};
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Minimum HMAC-SHA256 signing secret length in bytes.
///
/// Matches the SHA-256 output size; shorter keys are rejected at startup and
/// again at signing time.
pub const MIN_SIGNING_KEY_BYTES: usize = 32;

/// Default token lifetime (minutes).
pub const DEFAULT_TOKEN_LIFETIME_MINUTES: u64 = 20;

/// Upper bound for the configurable token lifetime (one day).
pub const MAX_TOKEN_LIFETIME_MINUTES: u64 = 24 * 60;

/// Failed attempts before an account is locked.
pub const DEFAULT_LOCKOUT_MAX_ATTEMPTS: u32 = 10;

/// How long a locked account stays locked (minutes).
pub const DEFAULT_LOCKOUT_WINDOW_MINUTES: u64 = 10;

/// Bcrypt cost bounds. Below 10 is too weak, above 14 is too slow for a login path.
pub const MIN_BCRYPT_COST: u32 = 10;
pub const MAX_BCRYPT_COST: u32 = 14;
pub const DEFAULT_BCRYPT_COST: u32 = 12;

/// Name of the role granted to the bootstrap administrator.
pub const ADMIN_ROLE: &str = "Admin";

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Signing algorithms accepted by the token issuer and validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningAlgorithm {
    Hs256,
}

impl SigningAlgorithm {
    /// JOSE `alg` header value.
    pub fn as_str(&self) -> &'static str {
        match self {
            SigningAlgorithm::Hs256 => "HS256",
        }
    }

    /// Minimum secret length for this algorithm.
    pub fn min_key_bytes(&self) -> usize {
        match self {
            SigningAlgorithm::Hs256 => MIN_SIGNING_KEY_BYTES,
        }
    }
}

/// Process-wide token signing policy.
///
/// Built once at startup and shared read-only with the issuer and the
/// validator. The secret is held in a `SecretBox`, so `Debug` output
/// never contains it.
#[derive(Debug)]
pub struct SigningPolicy {
    secret_key: SecretBox<Vec<u8>>,
    pub issuer: String,
    pub audience: String,
    pub algorithm: SigningAlgorithm,
    pub token_lifetime: Duration,
}

impl Clone for SigningPolicy {
    fn clone(&self) -> Self {
        Self {
            secret_key: SecretBox::new(Box::new(self.secret_key.expose_secret().clone())),
            issuer: self.issuer.clone(),
            audience: self.audience.clone(),
            algorithm: self.algorithm,
            token_lifetime: self.token_lifetime,
        }
    }
}

impl SigningPolicy {
    pub fn new(
        secret_key: Vec<u8>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
        token_lifetime: Duration,
    ) -> Self {
        Self {
            secret_key: SecretBox::new(Box::new(secret_key)),
            issuer: issuer.into(),
            audience: audience.into(),
            algorithm: SigningAlgorithm::Hs256,
            token_lifetime,
        }
    }

    /// Raw secret bytes. Callers must not log or persist the result.
    pub fn secret_key(&self) -> &[u8] {
        self.secret_key.expose_secret()
    }

    /// Reject keys that are empty or too short for the algorithm.
    pub fn ensure_signing_key(&self) -> Result<(), AuthError> {
        let len = self.secret_key.expose_secret().len();
        let min = self.algorithm.min_key_bytes();
        if len < min {
            return Err(AuthError::Configuration(format!(
                "Signing secret must be at least {} bytes for {}, got {}",
                min,
                self.algorithm.as_str(),
                len
            )));
        }
        Ok(())
    }

    /// Token lifetime in whole seconds.
    pub fn lifetime_seconds(&self) -> i64 {
        i64::try_from(self.token_lifetime.as_secs()).unwrap_or(i64::MAX)
    }
}

/// Failed-login lockout thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    pub max_failed_attempts: u32,
    pub lockout_window: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_failed_attempts: DEFAULT_LOCKOUT_MAX_ATTEMPTS,
            lockout_window: Duration::from_secs(DEFAULT_LOCKOUT_WINDOW_MINUTES * 60),
        }
    }
}

/// Administrative account to create on first start.
#[derive(Debug, Clone)]
pub struct AdminBootstrapOptions {
    pub username: String,
    pub email: String,
    pub default_password: SecretString,
    pub create_admin_user: bool,
}

impl AdminBootstrapOptions {
    /// Options that skip admin creation entirely.
    pub fn disabled() -> Self {
        Self {
            username: String::new(),
            email: String::new(),
            default_password: SecretString::from(""),
            create_admin_user: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    pub signing: SigningPolicy,
    pub lockout: LockoutPolicy,
    pub required_roles: Vec<String>,
    pub admin: AdminBootstrapOptions,
    pub bcrypt_cost: u32,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid signing secret: {0}")]
    InvalidSigningKey(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

impl From<ConfigError> for AuthError {
    fn from(err: ConfigError) -> Self {
        AuthError::Configuration(err.to_string())
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing)
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = required(vars, "DATABASE_URL")?;

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let secret = vars
            .get("GRUDA_JWT_SECRET")
            .ok_or_else(|| ConfigError::MissingEnvVar("GRUDA_JWT_SECRET".to_string()))?;
        if secret.is_empty() {
            return Err(ConfigError::InvalidSigningKey(
                "Signing secret is empty".to_string(),
            ));
        }
        if secret.len() < MIN_SIGNING_KEY_BYTES {
            return Err(ConfigError::InvalidSigningKey(format!(
                "Expected at least {} bytes, got {}",
                MIN_SIGNING_KEY_BYTES,
                secret.len()
            )));
        }

        let issuer = required(vars, "GRUDA_JWT_ISSUER")?;
        let audience = required(vars, "GRUDA_JWT_AUDIENCE")?;

        let lifetime_minutes = parse_u64(
            vars,
            "GRUDA_JWT_LIFETIME_MINUTES",
            DEFAULT_TOKEN_LIFETIME_MINUTES,
            1..=MAX_TOKEN_LIFETIME_MINUTES,
        )?;

        let signing = SigningPolicy::new(
            secret.as_bytes().to_vec(),
            issuer,
            audience,
            Duration::from_secs(lifetime_minutes * 60),
        );

        let max_failed_attempts = parse_u64(
            vars,
            "GRUDA_LOCKOUT_MAX_ATTEMPTS",
            u64::from(DEFAULT_LOCKOUT_MAX_ATTEMPTS),
            1..=1000,
        )?;
        let lockout_window_minutes = parse_u64(
            vars,
            "GRUDA_LOCKOUT_WINDOW_MINUTES",
            DEFAULT_LOCKOUT_WINDOW_MINUTES,
            1..=MAX_TOKEN_LIFETIME_MINUTES,
        )?;
        let lockout = LockoutPolicy {
            max_failed_attempts: u32::try_from(max_failed_attempts).map_err(|_| {
                ConfigError::InvalidValue {
                    name: "GRUDA_LOCKOUT_MAX_ATTEMPTS".to_string(),
                    reason: "out of range".to_string(),
                }
            })?,
            lockout_window: Duration::from_secs(lockout_window_minutes * 60),
        };

        let bcrypt_cost = parse_u64(
            vars,
            "BCRYPT_COST",
            u64::from(DEFAULT_BCRYPT_COST),
            u64::from(MIN_BCRYPT_COST)..=u64::from(MAX_BCRYPT_COST),
        )?;
        let bcrypt_cost = u32::try_from(bcrypt_cost).map_err(|_| ConfigError::InvalidValue {
            name: "BCRYPT_COST".to_string(),
            reason: "out of range".to_string(),
        })?;

        let create_admin_user = parse_bool(vars, "GRUDA_ADMIN_CREATE", false)?;
        let admin = if create_admin_user {
            AdminBootstrapOptions {
                username: required(vars, "GRUDA_ADMIN_USERNAME")?,
                email: required(vars, "GRUDA_ADMIN_EMAIL")?,
                default_password: SecretString::from(required(vars, "GRUDA_ADMIN_PASSWORD")?),
                create_admin_user: true,
            }
        } else {
            AdminBootstrapOptions::disabled()
        };

        let mut required_roles: Vec<String> = match vars.get("GRUDA_REQUIRED_ROLES") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(ToString::to_string)
                .collect(),
            None => vec![ADMIN_ROLE.to_string()],
        };
        if admin.create_admin_user && !required_roles.iter().any(|r| r == ADMIN_ROLE) {
            required_roles.push(ADMIN_ROLE.to_string());
        }
        let mut seen = std::collections::HashSet::new();
        required_roles.retain(|r| seen.insert(r.clone()));

        Ok(Config {
            database_url,
            bind_address,
            signing,
            lockout,
            required_roles,
            admin,
            bcrypt_cost,
        })
    }
}

/// Fetch a variable that must be present and non-empty.
fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    match vars.get(name) {
        Some(value) if !value.trim().is_empty() => Ok(value.clone()),
        _ => Err(ConfigError::MissingEnvVar(name.to_string())),
    }
}

fn parse_u64(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
    range: std::ops::RangeInclusive<u64>,
) -> Result<u64, ConfigError> {
    let Some(raw) = vars.get(name) else {
        return Ok(default);
    };

    let value: u64 = raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
        name: name.to_string(),
        reason: format!("{}", e),
    })?;

    if !range.contains(&value) {
        return Err(ConfigError::InvalidValue {
            name: name.to_string(),
            reason: format!(
                "{} is outside {}-{}",
                value,
                range.start(),
                range.end()
            ),
        });
    }

    Ok(value)
}

fn parse_bool(
    vars: &HashMap<String, String>,
    name: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(raw) = vars.get(name) else {
        return Ok(default);
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            name: name.to_string(),
            reason: format!("expected a boolean, got '{}'", other),
        }),
    }
}
