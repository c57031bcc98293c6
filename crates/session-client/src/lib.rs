//! Authenticated HTTP client with single-flight credential renewal
//!
//! [`ApiClient`] sends requests with the stored access token and, when the
//! server answers 401, renews the token pair through one shared exchange no
//! matter how many requests were rejected concurrently. Requests rejected
//! while an exchange is running wait for its outcome and are replayed with
//! the new access token.
//!
//! [`Session`] layers the auth endpoints (login, signup, logout, OTP,
//! username check) over the client and tracks the signed-in subject.

pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod renewal;
pub mod session;

#[cfg(test)]
mod testutil;

pub use error::{Error, Result};
pub use pipeline::{ApiClient, PipelineConfig, RequestOptions};
pub use renewal::RenewalStatus;
pub use session::Session;
