//! Gruda authentication service library.
//!
//! Password login backed by a credential store with failed-attempt lockout,
//! HS256 JWT issuance and validation, claims aggregation from users and
//! roles, and an idempotent startup bootstrap of roles and the admin account.
//!
//! # Modules
//!
//! - `config` - Service configuration and signing policy
//! - `crypto` - Password hashing and HS256 signing
//! - `errors` - Error types and their HTTP rendering
//! - `handlers` - HTTP request handlers
//! - `middleware` - Bearer authentication and HTTP metrics
//! - `models` - Users, claims, lockout state and tokens
//! - `observability` - Metrics and log correlation helpers
//! - `repositories` - Credential and role stores (Postgres and in-memory)
//! - `routes` - Router assembly
//! - `services` - Login, claims, token, lockout and bootstrap logic

pub mod config;
pub mod crypto;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
