//! Error types for the request pipeline and session facade

/// Errors surfaced to callers of [`ApiClient`](crate::ApiClient) and
/// [`Session`](crate::Session).
///
/// `Clone` because a single renewal outcome fans out to every queued request.
/// Ordinary server failures are not errors: they come back as
/// [`ApiResponse::Failed`](session_auth::ApiResponse::Failed) values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("no refresh token available, log in again")]
    Unauthenticated,

    #[error("credential renewal failed: {0}")]
    Renewal(#[from] session_auth::Error),

    #[error("credential renewal abandoned before completing")]
    RenewalAbandoned,

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renewal_errors_wrap_auth_errors() {
        let err: Error = session_auth::Error::MissingTokens.into();
        assert_eq!(err, Error::Renewal(session_auth::Error::MissingTokens));
        assert_eq!(
            err.to_string(),
            "credential renewal failed: refresh token response missing tokens"
        );
    }

    #[test]
    fn errors_are_cloneable_for_fan_out() {
        let err = Error::Renewal(session_auth::Error::RenewalRejected("401".into()));
        let copies: Vec<Error> = (0..3).map(|_| err.clone()).collect();
        assert!(copies.iter().all(|e| e == &err));
    }

    #[test]
    fn not_found_message_is_preserved() {
        let err = Error::ResourceNotFound("profile not found".into());
        assert_eq!(err.to_string(), "resource not found: profile not found");
    }
}
