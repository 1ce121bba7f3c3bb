//! Common utilities and types shared across Gruda components.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT structural utilities (size limits, segment decoding)
pub mod jwt;
