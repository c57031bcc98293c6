//! Session authentication primitives
//!
//! Provides the credential store, the uniform response envelope, the wire
//! types exchanged with the auth endpoints, and the refresh-token exchange.
//! This crate performs no request orchestration: the single-flight renewal
//! pipeline lives in `session-client` and builds on these pieces.
//!
//! Credential flow:
//! 1. Login / OTP verification responses carry tokens in the `authorization`
//!    and `refresh-token` headers, read with `token::credentials_from_headers()`
//! 2. Tokens are persisted via `credentials::CredentialStore`
//! 3. On 401 the pipeline calls `token::refresh_credentials()` with the stored
//!    refresh token
//! 4. The renewed pair is written back with `CredentialStore::save_pair()`

pub mod constants;
pub mod credentials;
pub mod envelope;
pub mod error;
pub mod token;
pub mod types;

pub use constants::*;
pub use credentials::{CredentialStore, StorageKeys};
pub use envelope::{ApiResponse, FieldIssue};
pub use error::{Error, Result};
pub use token::{CredentialPair, credentials_from_headers, refresh_credentials};
pub use types::*;
