//! Runtime configuration.
//!
//! Layering, lowest to highest precedence: built-in defaults, an optional
//! TOML file, the `NAVIGATOR_API_URL` environment variable, then CLI flags
//! (applied by the binary via [`NavigatorConfig::with_overrides`]).

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::NavError;

/// Environment variable that overrides the API origin.
pub const API_URL_ENV: &str = "NAVIGATOR_API_URL";

pub const DEFAULT_API_BASE_URL: &str = "http://34.55.80.46";

/// Questions granted to one session by the backend.
pub const MAX_QUESTIONS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NavigatorConfig {
    pub api_base_url: String,
    pub max_questions: u32,
    pub app_name: String,
    pub use_query_expansion: bool,
    /// Delay before the automatic logout that follows an expired session.
    pub logout_delay_ms: u64,
    /// Longest tolerated gap between stream events. `None` waits forever.
    pub stream_idle_timeout_secs: Option<u64>,
    pub connect_timeout_secs: u64,
    /// Per-request timeout for the auth endpoints.
    pub auth_timeout_secs: u64,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            max_questions: MAX_QUESTIONS,
            app_name: "Budget Navigator".to_string(),
            use_query_expansion: true,
            logout_delay_ms: 2_000,
            stream_idle_timeout_secs: None,
            connect_timeout_secs: 10,
            auth_timeout_secs: 10,
        }
    }
}

impl NavigatorConfig {
    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, NavError> {
        let mut cfg: NavigatorConfig = toml::from_str(s)?;
        cfg.api_base_url = normalize_origin(&cfg.api_base_url);
        Ok(cfg)
    }

    /// Load defaults, then `path` if given, then the environment override.
    pub fn load(path: Option<&Path>) -> Result<Self, NavError> {
        let mut cfg = match path {
            Some(p) => {
                let text = std::fs::read_to_string(p).map_err(|e| {
                    NavError::Config(format!("cannot read {}: {e}", p.display()))
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                cfg.api_base_url = normalize_origin(&url);
            }
        }
        Ok(cfg)
    }

    /// Apply command-line overrides on top of the loaded values.
    pub fn with_overrides(mut self, api_url: Option<&str>, stream_timeout: Option<u64>) -> Self {
        if let Some(url) = api_url {
            self.api_base_url = normalize_origin(url);
        }
        if stream_timeout.is_some() {
            self.stream_idle_timeout_secs = stream_timeout;
        }
        self
    }

    pub fn logout_delay(&self) -> Duration {
        Duration::from_millis(self.logout_delay_ms)
    }

    pub fn stream_idle_timeout(&self) -> Option<Duration> {
        self.stream_idle_timeout_secs.map(Duration::from_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }

    /// Join an endpoint path onto the configured origin.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base_url, path.trim_start_matches('/'))
    }
}

fn normalize_origin(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
