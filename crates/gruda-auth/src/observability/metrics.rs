//! Metrics definitions for the Gruda auth service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `gruda_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `status`: success, error
//! - `outcome`: authenticated, rejected, locked_out, invalid_request, error
//! - `reason`: the six token rejection reasons plus `none`
//! - `action`: created, exists, failed
//! - `path`: the fixed route table, everything else is `/other`

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Prometheus builder with the service's histogram buckets.
///
/// # Errors
///
/// Returns error if a bucket set is rejected.
pub fn prometheus_builder() -> Result<PrometheusBuilder, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("gruda_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.000, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("gruda_token_issuance".to_string()),
            &[0.0005, 0.001, 0.002, 0.005, 0.010, 0.025, 0.050],
        )
        .map_err(|e| format!("Failed to set token issuance buckets: {e}"))?
        // Login and bcrypt durations are dominated by the hash cost.
        .set_buckets_for_metric(
            Matcher::Prefix("gruda_login".to_string()),
            &[0.010, 0.050, 0.100, 0.200, 0.300, 0.500, 1.000, 2.000, 5.000],
        )
        .map_err(|e| format!("Failed to set login buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("gruda_bcrypt".to_string()),
            &[0.010, 0.050, 0.100, 0.200, 0.300, 0.500, 1.000, 2.000],
        )
        .map_err(|e| format!("Failed to set bcrypt buckets: {e}"))
}

/// Install the global Prometheus recorder and return the handle for
/// serving `/metrics`.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    prometheus_builder()?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// Token Metrics
// ============================================================================

/// Record token issuance duration and outcome
///
/// Metric: `gruda_token_issuance_duration_seconds`, `gruda_token_issuance_total`
/// Labels: `status`
pub fn record_token_issuance(status: &str, duration: Duration) {
    histogram!("gruda_token_issuance_duration_seconds", "status" => status.to_string())
        .record(duration.as_secs_f64());

    counter!("gruda_token_issuance_total", "status" => status.to_string()).increment(1);
}

/// Record token validation result
///
/// Metric: `gruda_token_validations_total`
/// Labels: `status`, `reason`
pub fn record_token_validation(status: &str, reason: Option<&str>) {
    let reason = reason.unwrap_or("none");
    counter!("gruda_token_validations_total", "status" => status.to_string(), "reason" => reason.to_string())
        .increment(1);
}

// ============================================================================
// Credential Metrics
// ============================================================================

/// Record a login attempt
///
/// Metric: `gruda_login_attempts_total`, `gruda_login_duration_seconds`
/// Labels: `outcome`
pub fn record_login_attempt(outcome: &str, duration: Duration) {
    histogram!("gruda_login_duration_seconds", "outcome" => outcome.to_string())
        .record(duration.as_secs_f64());

    counter!("gruda_login_attempts_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record an account transitioning into the locked state
///
/// Metric: `gruda_lockouts_total`
pub fn record_lockout() {
    counter!("gruda_lockouts_total").increment(1);
}

/// Record a compare-and-set conflict on lockout state
///
/// Metric: `gruda_lockout_conflicts_total`
pub fn record_lockout_conflict() {
    counter!("gruda_lockout_conflicts_total").increment(1);
}

/// Record bcrypt operation duration
///
/// Metric: `gruda_bcrypt_duration_seconds`
/// Labels: `operation` (hash, verify)
pub fn record_bcrypt_duration(operation: &str, duration: Duration) {
    histogram!("gruda_bcrypt_duration_seconds", "operation" => operation.to_string())
        .record(duration.as_secs_f64());
}

// ============================================================================
// Bootstrap Metrics
// ============================================================================

/// Record one bootstrap step
///
/// Metric: `gruda_bootstrap_actions_total`
/// Labels: `kind` (role, admin), `action` (created, exists, failed)
pub fn record_bootstrap_action(kind: &str, action: &str) {
    counter!("gruda_bootstrap_actions_total", "kind" => kind.to_string(), "action" => action.to_string())
        .increment(1);
}

// ============================================================================
// Error Metrics
// ============================================================================

/// Record error by category
///
/// Metric: `gruda_errors_total`
/// Labels: `operation`, `error_category`, `status_code`
pub fn record_error(operation: &str, error_category: &str, status_code: u16) {
    counter!("gruda_errors_total",
        "operation" => operation.to_string(),
        "error_category" => error_category.to_string(),
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `gruda_http_requests_total`, `gruda_http_request_duration_seconds`
/// Labels: `method`, `path`, `status_code`
///
/// This captures framework-level rejections too (415, 400 on bad JSON, 404,
/// 405), since the middleware sits outside every handler.
pub fn record_http_request(method: &str, path: &str, status_code: u16, duration: Duration) {
    let normalized_path = normalize_path(path);

    histogram!("gruda_http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => normalized_path,
        "status_code" => status_code.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("gruda_http_requests_total",
        "method" => method.to_string(),
        "path" => normalized_path,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Map a request path onto the fixed route table.
fn normalize_path(path: &str) -> &'static str {
    match path {
        "/" => "/",
        "/health" => "/health",
        "/metrics" => "/metrics",
        "/api/account/login" => "/api/account/login",
        "/api/authtest" => "/api/authtest",
        _ => "/other",
    }
}
