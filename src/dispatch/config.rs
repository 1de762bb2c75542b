use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONCURRENCY: usize = 1;

/// Connection settings for the remote record store.
#[derive(Clone, Debug)]
pub struct DispatchConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub require_api_key: bool,
    pub timeout: Duration,
    pub concurrency: usize,
    /// Overall batch budget; records not yet issued when it runs out are failed.
    pub deadline: Option<Duration>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            require_api_key: false,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            concurrency: DEFAULT_CONCURRENCY,
            deadline: None,
        }
    }
}

impl DispatchConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.base_url = non_empty_env("SHEETSYNC_BASE_URL");
        cfg.api_key = non_empty_env("SHEETSYNC_API_KEY");
        if let Some(v) = non_empty_env("SHEETSYNC_REQUIRE_API_KEY") {
            cfg.require_api_key = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(timeout) = non_empty_env("SHEETSYNC_TIMEOUT_SECS") {
            if let Ok(parsed) = timeout.parse::<u64>() {
                cfg.timeout = Duration::from_secs(parsed);
            }
        }
        if let Some(n) = non_empty_env("SHEETSYNC_CONCURRENCY") {
            if let Ok(parsed) = n.parse::<usize>() {
                cfg.concurrency = parsed;
            }
        }
        cfg
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Validated base URL. Fails before any network activity.
    pub fn resolve_base_url(&self) -> Result<Url, ConfigError> {
        let raw = self
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingBaseUrl)?;
        let url = Url::parse(raw).map_err(|e| ConfigError::InvalidBaseUrl { url: raw.to_string(), reason: e.to_string() })?;
        if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidBaseUrl { url: raw.to_string(), reason: "expected an http(s) URL".to_string() });
        }
        Ok(url)
    }

    pub fn resolve_api_key(&self) -> Result<Option<String>, ConfigError> {
        let key = self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty()).map(str::to_string);
        if key.is_none() && self.require_api_key {
            return Err(ConfigError::MissingApiKey);
        }
        Ok(key)
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
