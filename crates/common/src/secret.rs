//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports the [`secrecy`] types used across Gruda for anything that must
//! never reach a log line: user passwords, the bootstrap admin password, and
//! the HMAC signing secret.
//!
//! `SecretBox<T>` and `SecretString` implement `Debug` with redaction, so a
//! struct that derives `Debug` and holds a secret stays safe to log. Values
//! are zeroized on drop.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct LoginRequest {
//!     username: String,
//!     password: SecretString,
//! }
//!
//! let req = LoginRequest {
//!     username: "alice".to_string(),
//!     password: SecretString::from("Sup3r$ecret"),
//! };
//!
//! assert!(!format!("{req:?}").contains("Sup3r$ecret"));
//! assert_eq!(req.password.expose_secret(), "Sup3r$ecret");
//! ```
//!
//! # Usage Guidelines
//!
//! - `SecretString` for passwords received over the wire or from configuration.
//! - `SecretBox<Vec<u8>>` for binary key material such as the token signing secret.

pub use secrecy::{ExposeSecret, SecretBox, SecretString};
