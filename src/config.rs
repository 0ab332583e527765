//! Client configuration from the environment

use crate::session::DEFAULT_GREETING;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:5000";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{key} must be an http:// or https:// URL, got {value:?}")]
    InvalidUrl { key: &'static str, value: String },
    #[error("{key} must be a positive number of seconds, got {value:?}")]
    InvalidTimeout { key: &'static str, value: String },
}

/// Configuration for the assistant client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the assistant service, without a trailing `/`
    pub api_base_url: String,
    /// Where exported documents are written
    pub download_dir: PathBuf,
    /// Unset means requests wait as long as the service takes
    pub request_timeout: Option<Duration>,
    /// First assistant entry of a new session; `None` starts empty
    pub greeting: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            download_dir: PathBuf::from("."),
            request_timeout: None,
            greeting: Some(DEFAULT_GREETING.to_string()),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = lookup("CLINIKA_API_BASE_URL") {
            let url = url.trim().trim_end_matches('/');
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidUrl {
                    key: "CLINIKA_API_BASE_URL",
                    value: url.to_string(),
                });
            }
            config.api_base_url = url.to_string();
        }

        if let Some(dir) = lookup("CLINIKA_DOWNLOAD_DIR").filter(|d| !d.trim().is_empty()) {
            config.download_dir = PathBuf::from(dir);
        }

        if let Some(secs) = lookup("CLINIKA_REQUEST_TIMEOUT_SECS") {
            let parsed = secs.trim().parse::<u64>().ok().filter(|s| *s > 0);
            let Some(secs) = parsed else {
                return Err(ConfigError::InvalidTimeout {
                    key: "CLINIKA_REQUEST_TIMEOUT_SECS",
                    value: secs,
                });
            };
            config.request_timeout = Some(Duration::from_secs(secs));
        }

        // Present but empty disables the greeting
        if let Some(greeting) = lookup("CLINIKA_GREETING") {
            config.greeting = Some(greeting).filter(|g| !g.trim().is_empty());
        }

        Ok(config)
    }
}
