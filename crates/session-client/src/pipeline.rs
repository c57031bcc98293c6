//! Authenticated request pipeline
//!
//! Every call goes through [`ApiClient::request`]:
//! 1. Attach `Content-Type: application/json` and the stored access token
//!    (unless the caller supplied its own `Authorization` header)
//! 2. Send, converting connect/timeout failures into a `network_error` envelope
//! 3. Capture credentials pushed in headers by login / refresh / OTP verify
//! 4. On 401, renew once through the [`RenewalCoordinator`] and retry once
//! 5. Escalate `resource_not_found` envelopes to [`Error::ResourceNotFound`]

use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use session_auth::{
    ApiResponse, CredentialPair, CredentialStore, LOGIN_PATH, NETWORK_ERROR, OTP_VERIFY_PATH, REFRESH_TOKEN_PATH,
    RESOURCE_NOT_FOUND, credentials_from_headers, refresh_credentials,
};

use crate::error::{Error, Result};
use crate::metrics;
use crate::renewal::{RenewalCoordinator, RenewalStatus, Ticket};

/// Where the pipeline sends requests and which paths get special treatment.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Scheme and authority every request path is appended to.
    pub base_url: String,
    /// Path of the refresh-token exchange.
    pub refresh_path: String,
    /// Paths whose 401 is returned as-is instead of triggering renewal.
    pub renewal_exempt_paths: Vec<String>,
    /// Paths whose responses may push new credentials in headers.
    pub token_capture_paths: Vec<String>,
}

impl PipelineConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            refresh_path: REFRESH_TOKEN_PATH.to_string(),
            renewal_exempt_paths: vec![LOGIN_PATH.to_string()],
            token_capture_paths: vec![
                LOGIN_PATH.to_string(),
                REFRESH_TOKEN_PATH.to_string(),
                OTP_VERIFY_PATH.to_string(),
            ],
        }
    }

    /// Add a path whose 401 must not trigger renewal.
    pub fn exempt_from_renewal(mut self, path: impl Into<String>) -> Self {
        self.renewal_exempt_paths.push(path.into());
        self
    }
}

/// Per-request body and headers.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    body: Option<serde_json::Value>,
    headers: HeaderMap,
    retried: bool,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize `body` as the JSON request body.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| Error::InvalidRequest(format!("body is not serializable: {e}")))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Use an already-built JSON value as the request body.
    pub fn json_value(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Set a request header, replacing any previous value.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::InvalidRequest(format!("invalid header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::InvalidRequest(format!("invalid value for {name}: {e}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    fn replay_with(&self, access_token: Option<&str>) -> Result<Self> {
        let mut replay = self.clone();
        replay.retried = true;
        if let Some(token) = access_token {
            replay.headers.insert(AUTHORIZATION, bearer(token)?);
        }
        Ok(replay)
    }
}

/// One sent request: its HTTP status (absent when the server was unreachable)
/// and the parsed envelope.
struct Exchange<T> {
    status: Option<StatusCode>,
    envelope: ApiResponse<T>,
}

/// HTTP client that attaches stored credentials and renews them on 401.
///
/// One instance per authenticated session; clones of the inner
/// [`CredentialStore`] share state through the storage adapter.
pub struct ApiClient {
    config: PipelineConfig,
    http: reqwest::Client,
    credentials: Arc<CredentialStore>,
    renewal: RenewalCoordinator,
}

impl ApiClient {
    pub fn new(
        config: PipelineConfig,
        http: reqwest::Client,
        credentials: Arc<CredentialStore>,
    ) -> Self {
        Self {
            config,
            http,
            credentials,
            renewal: RenewalCoordinator::default(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    pub fn renewal_status(&self) -> RenewalStatus {
        self.renewal.status()
    }

    pub async fn get<T>(&self, path: &str) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned + Send,
    {
        self.request(Method::GET, path, RequestOptions::new()).await
    }

    pub async fn post<T>(&self, path: &str, options: RequestOptions) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned + Send,
    {
        self.request(Method::POST, path, options).await
    }

    pub async fn put<T>(&self, path: &str, options: RequestOptions) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned + Send,
    {
        self.request(Method::PUT, path, options).await
    }

    pub async fn delete<T>(&self, path: &str, options: RequestOptions) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned + Send,
    {
        self.request(Method::DELETE, path, options).await
    }

    /// Send a request, renewing credentials once if the server answers 401.
    ///
    /// Failure envelopes are returned as values, except `resource_not_found`
    /// which becomes [`Error::ResourceNotFound`]. Renewal failures are errors
    /// and reach every request queued behind the same renewal.
    #[instrument(skip_all, fields(request_id = %new_request_id(), method = %method, path = %path))]
    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned + Send,
    {
        let (generation, access_token) = self
            .renewal
            .snapshot(self.credentials.access_token())
            .await;
        let first = self
            .send_once::<T>(&method, path, &options, access_token.as_deref())
            .await?;

        if first.status != Some(StatusCode::UNAUTHORIZED) || options.retried {
            return escalate_not_found(first.envelope);
        }
        if self.is_renewal_exempt(path) {
            debug!("401 on renewal-exempt path, returning as-is");
            return Ok(first.envelope);
        }

        let replay = match self.renewal.enter(generation, &method, path) {
            Ticket::Lead(lease) => {
                info!("access token rejected, renewing credentials");
                let outcome = self.exchange().await;
                metrics::record_renewal(&outcome);
                let pair = match outcome {
                    Ok(pair) => pair,
                    Err(e) => {
                        let released = lease.settle(&Err(e.clone()));
                        warn!(released, error = %e, "credential renewal failed");
                        return Err(e);
                    }
                };
                let released = lease
                    .commit(
                        self.credentials.save_pair(&pair),
                        pair.access_token.clone(),
                    )
                    .await;
                info!(released, "credentials renewed");
                options.replay_with(Some(&pair.access_token))?
            }
            Ticket::Wait(waiter) => {
                metrics::record_waiter();
                let access_token = waiter.await.map_err(|_| Error::RenewalAbandoned)??;
                debug!("renewal settled, replaying queued request");
                options.replay_with(Some(&access_token))?
            }
            Ticket::Superseded => {
                debug!("credentials renewed since request was sent, retrying");
                let current = self.credentials.access_token().await;
                options.replay_with(current.as_deref())?
            }
        };

        let retried = self.send_once::<T>(&method, path, &replay, None).await?;
        escalate_not_found(retried.envelope)
    }

    /// Run the refresh-token exchange. Persisting the pair is the caller's
    /// job, under the renewal commit.
    async fn exchange(&self) -> Result<CredentialPair> {
        let Some(refresh_token) = self.credentials.refresh_token().await else {
            warn!("no refresh token stored, cannot renew");
            return Err(Error::Unauthenticated);
        };
        let url = self.url(&self.config.refresh_path);
        Ok(refresh_credentials(&self.http, &url, &refresh_token).await?)
    }

    async fn send_once<T>(
        &self,
        method: &Method,
        path: &str,
        options: &RequestOptions,
        access_token: Option<&str>,
    ) -> Result<Exchange<T>>
    where
        T: DeserializeOwned,
    {
        let mut headers = options.headers.clone();
        if !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        if !headers.contains_key(AUTHORIZATION)
            && let Some(token) = access_token
        {
            headers.insert(AUTHORIZATION, bearer(token)?);
        }

        let mut builder = self
            .http
            .request(method.clone(), self.url(path))
            .headers(headers);
        if let Some(body) = &options.body {
            builder = builder.json(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) if e.is_connect() || e.is_timeout() => {
                warn!(error = %e, "server unreachable");
                metrics::record_request(method.as_str(), NETWORK_ERROR);
                return Ok(Exchange {
                    status: None,
                    envelope: ApiResponse::network_error(),
                });
            }
            Err(e) => return Err(Error::Network(e.to_string())),
        };

        let status = response.status();
        metrics::record_request(method.as_str(), status.as_str());

        if self.captures_tokens(path) {
            self.capture_tokens(response.headers()).await;
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("reading response body: {e}")))?;
        let envelope = match serde_json::from_slice::<ApiResponse<T>>(&body) {
            Ok(envelope) => envelope,
            Err(_) if status == StatusCode::UNAUTHORIZED => {
                ApiResponse::unauthorized(status.canonical_reason().unwrap_or("Unauthorized"))
            }
            Err(e) => return Err(Error::Decode(format!("{status}: {e}"))),
        };

        debug!(
            status = status.as_u16(),
            success = envelope.is_success(),
            "response received"
        );
        Ok(Exchange {
            status: Some(status),
            envelope,
        })
    }

    async fn capture_tokens(&self, headers: &HeaderMap) {
        let (access, refresh) = credentials_from_headers(headers);
        if let Some(token) = &access {
            self.credentials.save_access_token(token).await;
        }
        if let Some(token) = &refresh {
            self.credentials.save_refresh_token(token).await;
        }
        if access.is_some() || refresh.is_some() {
            info!(
                access = access.is_some(),
                refresh = refresh.is_some(),
                "captured credentials from response headers"
            );
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn is_renewal_exempt(&self, path: &str) -> bool {
        path_matches(&self.config.renewal_exempt_paths, path)
    }

    fn captures_tokens(&self, path: &str) -> bool {
        path_matches(&self.config.token_capture_paths, path)
    }
}

fn path_matches(candidates: &[String], path: &str) -> bool {
    let path = normalize_path(path);
    candidates.iter().any(|c| normalize_path(c) == path)
}

/// Path without query, fragment or trailing slash.
fn normalize_path(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let trimmed = path[..end].trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

fn bearer(token: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|e| Error::InvalidRequest(format!("access token is not a valid header value: {e}")))
}

fn escalate_not_found<T>(envelope: ApiResponse<T>) -> Result<ApiResponse<T>> {
    if envelope.has_code(RESOURCE_NOT_FOUND) {
        return Err(Error::ResourceNotFound(envelope.message().to_string()));
    }
    Ok(envelope)
}

fn new_request_id() -> String {
    format!("req_{}", uuid::Uuid::new_v4().simple())
}
