//! HTTP client for the authentication endpoints.
//!
//! Every request goes through the shared [`reqwest::Client`] built by
//! [`http_client`], whose cookie jar carries the session cookie between the
//! auth calls and the chat stream.

use std::time::Duration;

use tracing::{debug, warn};

use crate::config::NavigatorConfig;
use crate::error::{AuthError, NavError};
use crate::session::SessionInfo;
use crate::types::{AuthMeResponse, ErrorDetail, RegisterRequest, RegisterResponse};

/// Result of asking the server whether the current session is still valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionProbe {
    /// `/auth/me` answered 2xx.
    Valid,
    /// `/auth/me` answered with a non-2xx status.
    Expired { status: u16 },
    /// No response at all.
    Unreachable { detail: String },
}

/// Build the cookie-carrying client shared by auth and chat requests.
///
/// No overall timeout is set here: the chat stream may legitimately stay
/// open for a long time. Auth calls set their own per-request timeout.
pub fn http_client(config: &NavigatorConfig) -> Result<reqwest::Client, NavError> {
    reqwest::Client::builder()
        .cookie_store(true)
        .connect_timeout(config.connect_timeout())
        .build()
        .map_err(|e| NavError::Config(format!("cannot build HTTP client: {e}")))
}

#[derive(Debug, Clone)]
pub struct AuthClient {
    base_url: String,
    client: reqwest::Client,
    request_timeout: Duration,
}

impl AuthClient {
    pub fn new(config: &NavigatorConfig, client: reqwest::Client) -> Self {
        Self {
            base_url: config.api_base_url.clone(),
            client,
            request_timeout: config.auth_timeout(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Probe `GET /auth/me` without caring about the body.
    pub async fn probe_session(&self) -> SessionProbe {
        let url = self.url("/auth/me");
        match self.client.get(&url).timeout(self.request_timeout).send().await {
            Ok(resp) if resp.status().is_success() => SessionProbe::Valid,
            Ok(resp) => SessionProbe::Expired { status: resp.status().as_u16() },
            Err(e) => {
                warn!(error = %e, url = %url, "session probe could not reach server");
                SessionProbe::Unreachable { detail: e.to_string() }
            }
        }
    }

    /// Look up the current session. Any failure reads as "not signed in".
    pub async fn check_session(&self) -> Option<SessionInfo> {
        let url = self.url("/auth/me");
        let resp = match self.client.get(&url).timeout(self.request_timeout).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = %e, url = %url, "auth check failed");
                return None;
            }
        };
        if !resp.status().is_success() {
            debug!(status = resp.status().as_u16(), "no active session");
            return None;
        }
        match resp.json::<AuthMeResponse>().await {
            Ok(me) => Some(me.into()),
            Err(e) => {
                warn!(error = %e, url = %url, "auth check returned an unreadable body");
                None
            }
        }
    }

    /// Register `name` (already validated) and start a session.
    pub async fn register(&self, name: &str) -> Result<SessionInfo, AuthError> {
        let url = self.url("/auth/register");
        let resp = self
            .client
            .post(&url)
            .timeout(self.request_timeout)
            .json(&RegisterRequest { name: name.to_string() })
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            // A missing or malformed error body still yields the generic message.
            let detail = resp
                .json::<ErrorDetail>()
                .await
                .ok()
                .and_then(|d| d.detail);
            return Err(AuthError::Rejected { status: status.as_u16(), detail });
        }

        resp.json::<RegisterResponse>()
            .await
            .map(SessionInfo::from)
            .map_err(|e| AuthError::Decode(e.to_string()))
    }

    /// End the session server-side. Failures are logged and swallowed.
    pub async fn logout(&self) {
        let url = self.url("/auth/logout");
        if let Err(e) = self.client.post(&url).timeout(self.request_timeout).send().await {
            warn!(error = %e, url = %url, "logout request failed");
        }
    }
}
