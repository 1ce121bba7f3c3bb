//! Deterministic fixtures: signing policy, service config and credentials.

use common::secret::SecretString;
use gruda_auth::config::{
    AdminBootstrapOptions, Config, LockoutPolicy, SigningPolicy, MIN_BCRYPT_COST,
};
use std::time::Duration;

/// 32-byte HS256 secret shared by every test policy.
pub const TEST_SIGNING_SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";
pub const TEST_ISSUER: &str = "gruda";
pub const TEST_AUDIENCE: &str = "gruda-clients";
pub const TEST_TOKEN_LIFETIME_SECONDS: u64 = 20 * 60;

/// Passwords that satisfy the account password policy.
pub const ALICE_PASSWORD: &str = "Al1ce!Secret";
pub const BOB_PASSWORD: &str = "B0b!Secret";
pub const ADMIN_PASSWORD: &str = "Adm1n!Passw0rd";

/// Signing policy matching the constants above.
pub fn test_signing_policy() -> SigningPolicy {
    SigningPolicy::new(
        TEST_SIGNING_SECRET.to_vec(),
        TEST_ISSUER,
        TEST_AUDIENCE,
        Duration::from_secs(TEST_TOKEN_LIFETIME_SECONDS),
    )
}

/// Full service configuration for in-process servers.
///
/// Uses the cheapest allowed bcrypt cost and leaves admin creation off.
pub fn test_config() -> Config {
    Config {
        database_url: String::new(),
        bind_address: "127.0.0.1:0".to_string(),
        signing: test_signing_policy(),
        lockout: LockoutPolicy::default(),
        required_roles: vec!["Admin".to_string()],
        admin: AdminBootstrapOptions::disabled(),
        bcrypt_cost: MIN_BCRYPT_COST,
    }
}

/// Admin options that create `root` with [`ADMIN_PASSWORD`].
pub fn test_admin_options() -> AdminBootstrapOptions {
    AdminBootstrapOptions {
        username: "root".to_string(),
        email: "root@gruda.io".to_string(),
        default_password: SecretString::from(ADMIN_PASSWORD),
        create_admin_user: true,
    }
}
