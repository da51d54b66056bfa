//! # Forge Configuration
//!
//! Endpoint and credential settings for the GitHub REST client.

use super::env_var_or_default;
use std::time::Duration;

/// Forge client configuration
#[derive(Clone)]
pub struct ForgeConfig {
    /// REST API base URL (GitHub Enterprise installations use `https://host/api/v3`)
    pub api_url: String,
    /// Web base URL used to build status links
    pub web_url: String,
    /// Personal access or app installation token
    pub token: Option<String>,
    /// Per-request timeout (seconds)
    pub request_timeout_secs: u64,
}

impl std::fmt::Debug for ForgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForgeConfig")
            .field("api_url", &self.api_url)
            .field("web_url", &self.web_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Default for ForgeConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            api_url: DEFAULT_FORGE_API_URL.to_string(),
            web_url: DEFAULT_FORGE_WEB_URL.to_string(),
            token: None,
            request_timeout_secs: DEFAULT_FORGE_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl ForgeConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            api_url: env_var_or_default("GITHUB_API_URL", DEFAULT_FORGE_API_URL.to_string()),
            web_url: env_var_or_default("GITHUB_WEB_URL", DEFAULT_FORGE_WEB_URL.to_string()),
            token: std::env::var("GITHUB_AUTH_TOKEN")
                .ok()
                .filter(|token| !token.trim().is_empty()),
            request_timeout_secs: env_var_or_default(
                "FORGE_REQUEST_TIMEOUT_SECS",
                DEFAULT_FORGE_REQUEST_TIMEOUT_SECS,
            ),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
