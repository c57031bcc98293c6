//! Session facade over the request pipeline
//!
//! Maps each auth operation to one pipeline call and tracks the signed-in
//! subject. The subject is mirrored into the credential store so a restarted
//! process can show who was signed in before any token is validated.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{info, warn};

use session_auth::{
    ApiResponse, LOGIN_PATH, LOGOUT_PATH, Login, LoginResponse, OTP_SEND_PATH, OTP_VERIFY_PATH,
    OtpEvent, OtpSent, OtpVerified, OtpVerify, REGISTER_PATH, Register, SignUpResponse,
    USERNAME_CHECK_PATH, UsernameAvailability,
};

use crate::error::{Error, Result};
use crate::pipeline::{ApiClient, RequestOptions};

pub struct Session {
    client: Arc<ApiClient>,
    user_id: RwLock<Option<String>>,
}

impl Session {
    /// Start with no signed-in subject.
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self {
            client,
            user_id: RwLock::new(None),
        }
    }

    /// Start with the subject persisted by a previous run, if any.
    pub async fn restore(client: Arc<ApiClient>) -> Self {
        let user_id = client.credentials().user_id().await;
        if let Some(id) = &user_id {
            info!(user_id = %id, "restored session subject");
        }
        Self {
            client,
            user_id: RwLock::new(user_id),
        }
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    pub async fn user_id(&self) -> Option<String> {
        self.user_id.read().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.user_id.read().await.is_some()
    }

    pub async fn login(&self, credentials: &Login) -> Result<ApiResponse<LoginResponse>> {
        let options = RequestOptions::new().json(credentials)?;
        let response = self
            .client
            .post::<LoginResponse>(LOGIN_PATH, options)
            .await?;
        if let Some(data) = success_data(&response) {
            self.remember(&data.user_id).await;
        }
        Ok(response)
    }

    pub async fn signup(&self, profile: &Register) -> Result<ApiResponse<SignUpResponse>> {
        let options = RequestOptions::new().json(profile)?;
        let response = self
            .client
            .post::<SignUpResponse>(REGISTER_PATH, options)
            .await?;
        if let Some(data) = success_data(&response) {
            self.remember(&data.user_id).await;
        }
        Ok(response)
    }

    /// Call the logout endpoint, then forget the subject whatever the outcome.
    ///
    /// Tokens stay in the store; callers that want them gone use
    /// [`CredentialStore::delete_tokens`](session_auth::CredentialStore::delete_tokens).
    pub async fn logout(&self) -> Result<ApiResponse<Value>> {
        let result = self
            .client
            .post::<Value>(LOGOUT_PATH, RequestOptions::new())
            .await;
        if let Err(e) = &result {
            warn!(error = %e, "logout request failed, clearing local subject anyway");
        }
        self.forget().await;
        result
    }

    pub async fn send_otp(&self, event: &OtpEvent) -> Result<ApiResponse<OtpSent>> {
        let options = RequestOptions::new().json(event)?;
        self.client.post(OTP_SEND_PATH, options).await
    }

    /// Verify an OTP. Credentials pushed by the server are captured by the
    /// pipeline.
    pub async fn verify_otp(&self, verify: &OtpVerify) -> Result<ApiResponse<OtpVerified>> {
        let options = RequestOptions::new().json(verify)?;
        self.client.post(OTP_VERIFY_PATH, options).await
    }

    pub async fn check_username_availability(
        &self,
        username: &str,
    ) -> Result<ApiResponse<UsernameAvailability>> {
        if username.is_empty() || username.contains(['/', '?', '#', '%']) {
            return Err(Error::InvalidRequest(format!(
                "username {username:?} cannot be used in a path"
            )));
        }
        self.client
            .get(&format!("{USERNAME_CHECK_PATH}/{username}"))
            .await
    }

    async fn remember(&self, user_id: &str) {
        *self.user_id.write().await = Some(user_id.to_string());
        self.client.credentials().save_user_id(user_id).await;
        info!(user_id = %user_id, "session subject set");
    }

    async fn forget(&self) {
        let previous = self.user_id.write().await.take();
        self.client.credentials().delete_user_id().await;
        if previous.is_some() {
            info!("session subject cleared");
        }
    }
}

fn success_data<T>(response: &ApiResponse<T>) -> Option<&T> {
    match response {
        ApiResponse::Success { data, .. } => data.as_ref(),
        ApiResponse::Failed { .. } => None,
    }
}
