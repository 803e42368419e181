//! Client settings: built-in defaults overridden by `SANKALP_*` environment
//! variables (`SANKALP_API_BASE_URL`, `SANKALP_REQUEST_TIMEOUT_SECS`,
//! `SANKALP_API_TOKEN`, `SANKALP_OFFLINE`).

use std::time::Duration;

use figment::providers::{Env, Serialized};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8001";

const fn default_timeout_secs() -> u64 {
    30
}

fn default_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid client settings: {0}")]
    Invalid(#[from] figment::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSettings {
    #[serde(default = "default_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub api_token: Option<String>,
    /// Use the in-process backend instead of the remote service.
    #[serde(default)]
    pub offline: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: default_base_url(),
            request_timeout_secs: default_timeout_secs(),
            api_token: None,
            offline: false,
        }
    }
}

impl ClientSettings {
    pub fn load() -> Result<Self, SettingsError> {
        Ok(Self::figment().extract()?)
    }

    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default())).merge(Env::prefixed("SANKALP_"))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Base URL without a trailing slash, ready for path concatenation.
    pub fn base_url(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }
}
