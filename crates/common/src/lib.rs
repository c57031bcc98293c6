//! Shared building blocks for the session workspace: a redacting wrapper
//! for credentials held in memory and the configuration error type.

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
