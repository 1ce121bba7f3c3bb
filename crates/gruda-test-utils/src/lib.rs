//! # Gruda Test Utilities
//!
//! Shared test utilities for the Gruda auth service.
//!
//! This crate provides:
//! - Deterministic fixtures (signing policy, config, users, passwords)
//! - Token builders for crafting arbitrary, possibly invalid, tokens
//! - Server test harness (TestAuthServer backed by in-memory stores)
//! - Fixed test IDs
//! - Custom assertions (TokenAssertions trait)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gruda_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let server = TestAuthServer::spawn().await?;
//!     server.create_user("alice", ALICE_PASSWORD, &["Admin"]).await?;
//!
//!     let token = server.login("alice", ALICE_PASSWORD).await?;
//!     token.assert_valid_jwt().assert_has_role("Admin");
//!     Ok(())
//! }
//! ```

pub mod assertions;
pub mod fixtures;
pub mod server_harness;
pub mod test_ids;
pub mod token_builders;

pub use assertions::*;
pub use fixtures::*;
pub use server_harness::*;
pub use test_ids::*;
pub use token_builders::*;
