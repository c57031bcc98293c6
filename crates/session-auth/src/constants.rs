//! Endpoint paths, header names, storage keys and envelope codes
//!
//! Paths are relative to the configured API base URL.

/// Password / username login
pub const LOGIN_PATH: &str = "/api/v1/auth/login";

/// Refresh-token exchange (authorized by the refresh credential)
pub const REFRESH_TOKEN_PATH: &str = "/api/v1/auth/refresh-token";

pub const LOGOUT_PATH: &str = "/api/v1/auth/logout";

pub const REGISTER_PATH: &str = "/api/v1/auth/register";

/// Request a one-time password
pub const OTP_SEND_PATH: &str = "/api/v1/otp";

/// Verify a one-time password. Responses may carry renewed credentials.
pub const OTP_VERIFY_PATH: &str = "/api/v1/otp/verify";

/// Username availability check; the username is appended as a path segment.
pub const USERNAME_CHECK_PATH: &str = "/api/v1/users/check-username";

/// Response header carrying a new access token
pub const ACCESS_TOKEN_HEADER: &str = "authorization";

/// Response header carrying a new refresh token
pub const REFRESH_TOKEN_HEADER: &str = "refresh-token";

/// Default storage key for the access token
pub const ACCESS_TOKEN_KEY: &str = "authorization";

/// Default storage key for the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refresh-token";

/// Default storage key for the subject identifier
pub const USER_ID_KEY: &str = "user-id";

/// Envelope code raised as an error instead of returned as a value
pub const RESOURCE_NOT_FOUND: &str = "resource_not_found";

/// Envelope code synthesized locally when the server cannot be reached
pub const NETWORK_ERROR: &str = "network_error";

/// Envelope code synthesized for a 401 whose body is not an envelope
pub const UNAUTHORIZED: &str = "unauthorized";

pub const NETWORK_ERROR_MESSAGE: &str =
    "Could not connect to the server. Please check your network connection and try again.";
