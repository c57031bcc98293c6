//! Request and response bodies for the auth endpoints
//!
//! Shapes only: field validation (password strength, username rules) is the
//! server's job. Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

/// Login credentials. At least one of `email` / `username` identifies the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Login {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub password: String,
}

impl Login {
    pub fn with_email(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            username: None,
            password: password.into(),
        }
    }

    pub fn with_username(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: None,
            username: Some(username.into()),
            password: password.into(),
        }
    }

    /// Build from a single identifier: anything containing `@` is an email.
    pub fn with_identifier(identifier: &str, password: impl Into<String>) -> Self {
        if identifier.contains('@') {
            Self::with_email(identifier, password)
        } else {
            Self::with_username(identifier, password)
        }
    }
}

/// Registration profile: email/password sign-up or a Google-linked account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Register {
    #[serde(rename_all = "camelCase")]
    EmailPassword {
        email: String,
        username: String,
        password: String,
        confirm_password: String,
    },
    #[serde(rename_all = "camelCase")]
    Google {
        email: String,
        username: String,
        is_email_verified: bool,
        google_id: String,
    },
}

/// Notification kinds an OTP can be issued or verified for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OtpType {
    EmailVerificationOtp,
    ForgetPasswordOtp,
    PasswordChangeConfirmation,
}

/// OTP issue request, discriminated by `otpType`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "otpType")]
pub enum OtpEvent {
    #[serde(rename = "emailVerificationOtp")]
    EmailVerification { email: String },
    #[serde(rename = "forgetPasswordOtp")]
    ForgetPassword { email: String },
}

/// OTP verification request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpVerify {
    pub otp: String,
    pub otp_type: OtpType,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpResponse {
    pub user_id: String,
    pub token: String,
}

/// Response to an OTP issue request; `token` correlates the later verify call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpSent {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpVerified {
    pub action_token: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsernameAvailability {
    pub is_available: bool,
}
