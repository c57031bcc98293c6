//! Client-side request and renewal counters
//!
//! - `session_requests_total` (counter): labels `method`, `status`
//! - `session_renewals_total` (counter): label `outcome`
//! - `session_renewal_waiters_total` (counter)
//!
//! The crate never installs a recorder. Without one these calls are no-ops.

use crate::error::Error;

/// Record a completed exchange. `status` is the HTTP status code, or
/// `network_error` when the server was unreachable.
pub fn record_request(method: &str, status: &str) {
    metrics::counter!(
        "session_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record the outcome of a renewal exchange this client initiated.
pub fn record_renewal<T>(outcome: &Result<T, Error>) {
    metrics::counter!("session_renewals_total", "outcome" => renewal_outcome(outcome))
        .increment(1);
}

/// Record a request that queued behind an in-flight renewal.
pub fn record_waiter() {
    metrics::counter!("session_renewal_waiters_total").increment(1);
}

fn renewal_outcome<T>(outcome: &Result<T, Error>) -> &'static str {
    match outcome {
        Ok(_) => "success",
        Err(Error::Unauthenticated) => "unauthenticated",
        Err(Error::Renewal(session_auth::Error::MissingTokens)) => "missing_tokens",
        Err(Error::Renewal(session_auth::Error::RenewalRejected(_))) => "rejected",
        Err(Error::Renewal(session_auth::Error::Network(_))) => "network",
        Err(_) => "error",
    }
}
