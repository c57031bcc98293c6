//! Refresh-token exchange and credential header capture
//!
//! The auth server pushes credentials in two response headers:
//! `authorization` (access token) and `refresh-token` (refresh token). Login,
//! refresh and OTP verification responses may all carry them.
//!
//! The refresh exchange is authorized by the refresh token only; the access
//! token never renews anything.

use std::fmt;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap};
use tracing::{debug, warn};

use crate::constants::{ACCESS_TOKEN_HEADER, REFRESH_TOKEN_HEADER};
use crate::error::{Error, Result};

/// A renewed access/refresh token pair.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

/// Read the access and refresh tokens pushed in response headers.
///
/// Either may be absent. A leading `Bearer ` scheme is dropped so the stored
/// value is the bare token; blank values count as absent.
pub fn credentials_from_headers(headers: &HeaderMap) -> (Option<String>, Option<String>) {
    (
        header_token(headers, ACCESS_TOKEN_HEADER),
        header_token(headers, REFRESH_TOKEN_HEADER),
    )
}

fn header_token(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(name)?.to_str().ok()?;
    let token = strip_bearer(raw.trim());
    (!token.is_empty()).then(|| token.to_string())
}

/// Drop a case-insensitive `Bearer ` prefix if present.
pub fn strip_bearer(value: &str) -> &str {
    match value.get(..7) {
        Some(scheme) if scheme.eq_ignore_ascii_case("bearer ") => value[7..].trim_start(),
        _ => value,
    }
}

/// Exchange a refresh token for a new credential pair.
///
/// POSTs to `url` with `Authorization: Bearer <refresh>`. The response must be
/// 2xx and carry both renewal headers; anything else is an error. Nothing is
/// persisted here.
pub async fn refresh_credentials(
    client: &reqwest::Client,
    url: &str,
    refresh: &str,
) -> Result<CredentialPair> {
    let response = client
        .post(url)
        .header(CONTENT_TYPE, "application/json")
        .header(AUTHORIZATION, format!("Bearer {refresh}"))
        .send()
        .await
        .map_err(|e| Error::Network(format!("token refresh request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        warn!(%status, "refresh endpoint rejected the refresh token");
        return Err(Error::RenewalRejected(format!(
            "token refresh returned {status}: {body}"
        )));
    }

    match credentials_from_headers(response.headers()) {
        (Some(access_token), Some(refresh_token)) => {
            debug!("refresh endpoint returned a new credential pair");
            Ok(CredentialPair {
                access_token,
                refresh_token,
            })
        }
        (access, refresh) => {
            warn!(
                has_access = access.is_some(),
                has_refresh = refresh.is_some(),
                "refresh response missing tokens"
            );
            Err(Error::MissingTokens)
        }
    }
}
