//! Error types for the refresh-token exchange

/// Errors from session authentication operations.
///
/// Variants carry rendered messages rather than source errors so the type
/// stays `Clone`: one renewal failure is delivered to every waiting caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("network error: {0}")]
    Network(String),

    #[error("refresh token rejected: {0}")]
    RenewalRejected(String),

    #[error("refresh token response missing tokens")]
    MissingTokens,
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
