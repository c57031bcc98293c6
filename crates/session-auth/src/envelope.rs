//! Uniform response envelope
//!
//! Every endpoint answers with either
//! `{"status":"success","message":...,"data":...}` or
//! `{"status":"failed","message":...,"code":...,"errors":[...]}`.
//! Callers branch on the variant; only `resource_not_found` is escalated to an
//! error by the request pipeline.

use serde::{Deserialize, Serialize};

use crate::constants::{NETWORK_ERROR, NETWORK_ERROR_MESSAGE, UNAUTHORIZED};

/// Response envelope, tagged by the `status` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ApiResponse<T> {
    Success {
        #[serde(default)]
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<T>,
    },
    Failed {
        #[serde(default)]
        message: String,
        code: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        errors: Option<Vec<FieldIssue>>,
    },
}

/// One field-level validation problem reported by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldIssue {
    #[serde(default)]
    pub path: Vec<serde_json::Value>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Envelope synthesized when the server could not be reached.
    pub fn network_error() -> Self {
        ApiResponse::Failed {
            message: NETWORK_ERROR_MESSAGE.to_string(),
            code: NETWORK_ERROR.to_string(),
            errors: None,
        }
    }

    /// Envelope synthesized for a 401 whose body was not an envelope.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiResponse::Failed {
            message: message.into(),
            code: UNAUTHORIZED.to_string(),
            errors: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ApiResponse::Success { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            ApiResponse::Success { message, .. } | ApiResponse::Failed { message, .. } => message,
        }
    }

    /// Failure code, `None` for success envelopes.
    pub fn code(&self) -> Option<&str> {
        match self {
            ApiResponse::Success { .. } => None,
            ApiResponse::Failed { code, .. } => Some(code),
        }
    }

    /// Whether this is a failure envelope carrying `code`.
    pub fn has_code(&self, code: &str) -> bool {
        self.code() == Some(code)
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            ApiResponse::Success { data, .. } => data.as_ref(),
            ApiResponse::Failed { .. } => None,
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            ApiResponse::Success { data, .. } => data,
            ApiResponse::Failed { .. } => None,
        }
    }
}
