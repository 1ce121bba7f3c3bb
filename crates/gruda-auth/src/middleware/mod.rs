//! HTTP middleware for the auth service.
//!
//! - `auth` - bearer token validation for protected routes
//! - `http_metrics` - request metrics, applied as the outermost layer

pub mod auth;
pub mod http_metrics;

pub use auth::{require_auth, AuthState};
pub use http_metrics::http_metrics_middleware;
