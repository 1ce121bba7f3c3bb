//! Password and email rules for accounts created by the service.

use crate::errors::AuthError;
use std::collections::HashSet;

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MIN_UNIQUE_CHARS: usize = 2;

/// Check a candidate password against every rule.
///
/// # Errors
///
/// Returns `AuthError::Validation` naming every unmet rule.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    let mut problems = Vec::new();

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        problems.push(format!(
            "must be at least {} characters",
            MIN_PASSWORD_LENGTH
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        problems.push("must contain a digit".to_string());
    }
    if !password.chars().any(char::is_lowercase) {
        problems.push("must contain a lowercase letter".to_string());
    }
    if !password.chars().any(char::is_uppercase) {
        problems.push("must contain an uppercase letter".to_string());
    }
    if password.chars().all(char::is_alphanumeric) {
        problems.push("must contain a non-alphanumeric character".to_string());
    }
    if password.chars().collect::<HashSet<_>>().len() < MIN_UNIQUE_CHARS {
        problems.push(format!(
            "must contain at least {} distinct characters",
            MIN_UNIQUE_CHARS
        ));
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(AuthError::Validation(format!(
            "Password {}",
            problems.join("; ")
        )))
    }
}

/// Basic `local@domain.tld` shape check.
pub fn is_valid_email(email: &str) -> bool {
    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };

    if local.is_empty() || email.chars().any(char::is_whitespace) {
        return false;
    }

    let mut labels = domain.split('.');
    let has_dot = domain.contains('.');
    has_dot && labels.all(|label| !label.is_empty())
}
