//! Command parsing and execution
//!
//! Each command runs one session operation and renders the result as JSON
//! for stdout. Failure envelopes are output, not errors; errors are reserved
//! for renewal failures, missing resources and unusable input.

use anyhow::{Context, Result, anyhow, bail};
use reqwest::Method;
use serde::Serialize;
use serde_json::{Value, json};
use session_auth::{Login, OtpEvent, OtpType, OtpVerify};
use session_client::{RequestOptions, Session};

use common::Secret;

pub const USAGE: &str = "\
usage: session-cli [--config PATH] <command>

commands:
  login <email-or-username>        log in (password from SESSION_PASSWORD)
  logout                           end the server session and forget the user
  whoami                           show the stored user and token presence
  request <METHOD> <path> [json]   send an authenticated request
  send-otp <email>                 request an email verification code
  verify-otp <otp> <token>         verify a code returned by send-otp
  check-username <name>            check whether a username is free
  clear-tokens                     delete stored access and refresh tokens";

#[derive(Debug, PartialEq)]
pub enum Command {
    Login { identifier: String },
    Logout,
    WhoAmI,
    Request {
        method: Method,
        path: String,
        body: Option<Value>,
    },
    SendOtp { email: String },
    VerifyOtp { otp: String, token: String },
    CheckUsername { username: String },
    ClearTokens,
}

/// Split `--config PATH` from the command words.
pub fn split_args(args: &[String]) -> Result<(Option<String>, Vec<String>)> {
    let mut config = None;
    let mut rest = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let path = iter.next().context("--config requires a path")?;
            config = Some(path.clone());
        } else {
            rest.push(arg.clone());
        }
    }
    Ok((config, rest))
}

impl Command {
    pub fn parse(words: &[String]) -> Result<Self> {
        let words: Vec<&str> = words.iter().map(String::as_str).collect();
        let command = match words.as_slice() {
            ["login", identifier] => Command::Login {
                identifier: identifier.to_string(),
            },
            ["logout"] => Command::Logout,
            ["whoami"] => Command::WhoAmI,
            ["request", method, path, rest @ ..] if rest.len() <= 1 => {
                let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                    .map_err(|e| anyhow!("invalid method {method:?}: {e}"))?;
                if !path.starts_with('/') {
                    bail!("path must start with '/', got {path:?}");
                }
                let body = rest
                    .first()
                    .map(|raw| serde_json::from_str(raw).context("request body is not valid JSON"))
                    .transpose()?;
                Command::Request {
                    method,
                    path: path.to_string(),
                    body,
                }
            }
            ["send-otp", email] => Command::SendOtp {
                email: email.to_string(),
            },
            ["verify-otp", otp, token] => Command::VerifyOtp {
                otp: otp.to_string(),
                token: token.to_string(),
            },
            ["check-username", username] => Command::CheckUsername {
                username: username.to_string(),
            },
            ["clear-tokens"] => Command::ClearTokens,
            [] => bail!("missing command\n\n{USAGE}"),
            _ => bail!("unrecognized command: {}\n\n{USAGE}", words.join(" ")),
        };
        Ok(command)
    }

    /// Run against `session` and return the JSON to print.
    pub async fn run(self, session: &Session, password: Option<&Secret<String>>) -> Result<Value> {
        match self {
            Command::Login { identifier } => {
                let password = password.context("SESSION_PASSWORD must be set to log in")?;
                let login = Login::with_identifier(&identifier, password.expose().clone());
                render(session.login(&login).await?)
            }
            Command::Logout => render(session.logout().await?),
            Command::WhoAmI => {
                let store = session.client().credentials();
                Ok(json!({
                    "userId": session.user_id().await,
                    "hasAccessToken": store.access_token().await.is_some(),
                    "hasRefreshToken": store.refresh_token().await.is_some(),
                }))
            }
            Command::Request { method, path, body } => {
                let options = match body {
                    Some(body) => RequestOptions::new().json_value(body),
                    None => RequestOptions::new(),
                };
                let response = session
                    .client()
                    .request::<Value>(method, &path, options)
                    .await?;
                render(response)
            }
            Command::SendOtp { email } => {
                render(session.send_otp(&OtpEvent::EmailVerification { email }).await?)
            }
            Command::VerifyOtp { otp, token } => {
                let verify = OtpVerify {
                    otp,
                    otp_type: OtpType::EmailVerificationOtp,
                    token,
                };
                render(session.verify_otp(&verify).await?)
            }
            Command::CheckUsername { username } => {
                render(session.check_username_availability(&username).await?)
            }
            Command::ClearTokens => {
                session.client().credentials().delete_tokens().await;
                Ok(json!({"status": "success", "message": "tokens cleared"}))
            }
        }
    }
}

fn render<T: Serialize>(value: T) -> Result<Value> {
    serde_json::to_value(value).context("failed to render response")
}
