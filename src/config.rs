//! Client configuration

use crate::error::{ClientError, Result};
use std::time::Duration;

pub const LOGIN_PATH: &str = "/auth/login";
pub const REFRESH_PATH: &str = "/auth/refresh";
pub const LOGOUT_PATH: &str = "/auth/logout";
pub const BOLETOS_PATH: &str = "/boletos";
pub const CATEGORIES_PATH: &str = "/categories";

/// Configuration for the API client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL without trailing slash, e.g. `https://api.example.com/v1`
    pub base_url: String,

    /// Device description sent on login (`X-Device-Info`) and refresh
    pub device_info: String,

    /// Per-request timeout applied by the HTTP transport
    /// Default: 30 seconds
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            device_info: default_device_info(),
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_device_info(mut self, device_info: impl Into<String>) -> Self {
        self.device_info = device_info.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Build from `BOLETOS_API_URL`, `BOLETOS_DEVICE_INFO` and `BOLETOS_TIMEOUT_SECS`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base_url = lookup("BOLETOS_API_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ClientError::Configuration("BOLETOS_API_URL is not set".to_string()))?;

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ClientError::Configuration(format!(
                "BOLETOS_API_URL must be an http(s) URL, got {base_url}"
            )));
        }

        let mut config = Self::new(base_url);

        if let Some(device_info) = lookup("BOLETOS_DEVICE_INFO") {
            config.device_info = device_info;
        }

        if let Some(raw) = lookup("BOLETOS_TIMEOUT_SECS") {
            let secs: u64 = raw.parse().map_err(|_| {
                ClientError::Configuration(format!("BOLETOS_TIMEOUT_SECS must be an integer, got {raw}"))
            })?;
            config.request_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

fn default_device_info() -> String {
    format!(
        "{}/{} ({})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS
    )
}
