//! Username/password verification with failed-attempt lockout.
//!
//! Lockout state transitions:
//!
//! | state                   | password | result                                   |
//! |-------------------------|----------|------------------------------------------|
//! | unlocked                | correct  | counter reset, `Authenticated`           |
//! | unlocked                | wrong    | counter + 1; at the maximum, `LockedOut` |
//! | locked, `now < until`   | any      | `LockedOut`, nothing counted or checked  |
//! | locked, `now >= until`  | any      | counter treated as 0, unlocked rules     |
//!
//! Every state change is a compare-and-set against the store. A conflict
//! means another login for the same user won the race; the state is
//! re-read and the rules applied again.

use crate::config::LockoutPolicy;
use crate::crypto;
use crate::errors::AuthError;
use crate::models::{LockoutState, LockoutUpdate, UserIdentity};
use crate::observability::hash_for_correlation;
use crate::observability::metrics::{record_lockout, record_lockout_conflict};
use crate::repositories::CredentialStore;
use chrono::{DateTime, SubsecRound, Utc};
use tracing::instrument;

/// Compare-and-set attempts before giving up with a store error.
pub const MAX_LOCKOUT_UPDATE_ATTEMPTS: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    /// Unknown user or wrong password. Never distinguished.
    BadCredentials,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Authenticated(UserIdentity),
    Rejected(RejectionReason),
    LockedOut { until: DateTime<Utc> },
}

impl LoginOutcome {
    /// Bounded label for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginOutcome::Authenticated(_) => "authenticated",
            LoginOutcome::Rejected(_) => "rejected",
            LoginOutcome::LockedOut { .. } => "locked_out",
        }
    }
}

/// Verify credentials against the store, using the current time.
pub async fn verify_credentials(
    store: &dyn CredentialStore,
    policy: &LockoutPolicy,
    username: &str,
    password: &str,
) -> Result<LoginOutcome, AuthError> {
    verify_credentials_at(store, policy, username, password, Utc::now()).await
}

/// Verify credentials against the store as of `now`.
///
/// # Errors
///
/// - `Validation` if the username or password is empty (no state change)
/// - `Store` if the store fails or the compare-and-set keeps conflicting
#[instrument(skip_all, name = "gruda.services.credentials.verify")]
pub async fn verify_credentials_at(
    store: &dyn CredentialStore,
    policy: &LockoutPolicy,
    username: &str,
    password: &str,
    now: DateTime<Utc>,
) -> Result<LoginOutcome, AuthError> {
    if username.trim().is_empty() {
        return Err(AuthError::Validation("Username is required".to_string()));
    }
    if password.is_empty() {
        return Err(AuthError::Validation("Password is required".to_string()));
    }

    let user_hash = hash_for_correlation(username);

    let Some(user) = store.find_by_username(username).await? else {
        crypto::verify_dummy_password(password);
        tracing::info!(
            target: "gruda.services.credentials",
            user = %user_hash,
            "Login rejected: unknown user"
        );
        return Ok(LoginOutcome::Rejected(RejectionReason::BadCredentials));
    };

    let state = store.get_lockout_state(&user.id).await?;
    if let Some(until) = active_lock(&state, now) {
        tracing::info!(
            target: "gruda.services.credentials",
            user = %user_hash,
            locked_until = %until,
            "Login refused: account locked"
        );
        return Ok(LoginOutcome::LockedOut { until });
    }

    if store.verify_password(&user.id, password).await? {
        record_success(store, user, state, now, &user_hash).await
    } else {
        record_failure(store, policy, &user.id, state, now, &user_hash).await
    }
}

fn active_lock(state: &LockoutState, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    state.locked_until.filter(|until| now < *until)
}

async fn record_success(
    store: &dyn CredentialStore,
    user: UserIdentity,
    mut current: LockoutState,
    now: DateTime<Utc>,
    user_hash: &str,
) -> Result<LoginOutcome, AuthError> {
    for _ in 0..MAX_LOCKOUT_UPDATE_ATTEMPTS {
        // A concurrent failure may have locked the account meanwhile.
        if let Some(until) = active_lock(&current, now) {
            return Ok(LoginOutcome::LockedOut { until });
        }
        if current == LockoutState::default() {
            tracing::info!(target: "gruda.services.credentials", user = %user_hash, "Login succeeded");
            return Ok(LoginOutcome::Authenticated(user));
        }

        match store
            .update_lockout_state(&user.id, current, LockoutState::default())
            .await?
        {
            LockoutUpdate::Updated => {
                tracing::info!(
                    target: "gruda.services.credentials",
                    user = %user_hash,
                    cleared_failures = current.failed_attempt_count,
                    "Login succeeded, failed attempt counter reset"
                );
                return Ok(LoginOutcome::Authenticated(user));
            }
            LockoutUpdate::Conflict => {
                record_lockout_conflict();
                current = store.get_lockout_state(&user.id).await?;
            }
        }
    }

    Err(conflicts_exhausted(user_hash))
}

async fn record_failure(
    store: &dyn CredentialStore,
    policy: &LockoutPolicy,
    user_id: &str,
    mut current: LockoutState,
    now: DateTime<Utc>,
    user_hash: &str,
) -> Result<LoginOutcome, AuthError> {
    let window = chrono::Duration::from_std(policy.lockout_window)
        .map_err(|e| AuthError::Configuration(format!("Invalid lockout window: {}", e)))?;

    for _ in 0..MAX_LOCKOUT_UPDATE_ATTEMPTS {
        if let Some(until) = active_lock(&current, now) {
            return Ok(LoginOutcome::LockedOut { until });
        }

        // An expired lock starts a fresh count.
        let previous = if current.locked_until.is_some() {
            0
        } else {
            current.failed_attempt_count
        };
        let failed_attempt_count = previous.saturating_add(1);
        let locked_until = if failed_attempt_count >= policy.max_failed_attempts {
            // Stores keep microseconds; a finer value would not read back equal.
            Some(
                now.checked_add_signed(window)
                    .ok_or_else(|| AuthError::Configuration("Lockout window overflows".into()))?
                    .trunc_subsecs(6),
            )
        } else {
            None
        };
        let next = LockoutState {
            failed_attempt_count,
            locked_until,
        };

        match store.update_lockout_state(user_id, current, next).await? {
            LockoutUpdate::Updated => {
                return Ok(match locked_until {
                    Some(until) => {
                        record_lockout();
                        tracing::warn!(
                            target: "gruda.services.credentials",
                            user = %user_hash,
                            failed_attempts = failed_attempt_count,
                            locked_until = %until,
                            "Account locked after repeated failed logins"
                        );
                        LoginOutcome::LockedOut { until }
                    }
                    None => {
                        tracing::info!(
                            target: "gruda.services.credentials",
                            user = %user_hash,
                            failed_attempts = failed_attempt_count,
                            "Login rejected: wrong password"
                        );
                        LoginOutcome::Rejected(RejectionReason::BadCredentials)
                    }
                });
            }
            LockoutUpdate::Conflict => {
                record_lockout_conflict();
                current = store.get_lockout_state(user_id).await?;
            }
        }
    }

    Err(conflicts_exhausted(user_hash))
}

fn conflicts_exhausted(user_hash: &str) -> AuthError {
    tracing::error!(
        target: "gruda.services.credentials",
        user = %user_hash,
        attempts = MAX_LOCKOUT_UPDATE_ATTEMPTS,
        "Lockout state update kept conflicting"
    );
    AuthError::Store(format!(
        "Lockout state update conflicted {} times",
        MAX_LOCKOUT_UPDATE_ATTEMPTS
    ))
}
