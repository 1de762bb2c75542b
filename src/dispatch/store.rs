use std::fmt;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use url::Url;

use crate::error::ConfigError;
use crate::model::Fields;
use crate::telemetry::{self};

use super::config::DispatchConfig;

/// Why a single update did not land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchFailure {
    /// The store answered with a non-2xx status.
    Status(u16),
    Timeout,
    Transport(String),
    /// Not issued: the batch was cancelled or its deadline passed first.
    Cancelled,
    MissingId,
}

impl fmt::Display for PatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchFailure::Status(code) => write!(f, "status {code}"),
            PatchFailure::Timeout => write!(f, "request timed out"),
            PatchFailure::Transport(msg) => write!(f, "transport error: {msg}"),
            PatchFailure::Cancelled => write!(f, "cancelled before dispatch"),
            PatchFailure::MissingId => write!(f, "record has no id"),
        }
    }
}

/// Outcome of one update call. Remote trouble is a value here, never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchResult {
    Applied,
    Failed(PatchFailure),
}

impl PatchResult {
    pub fn succeeded(&self) -> bool { matches!(self, PatchResult::Applied) }
}

impl fmt::Display for PatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchResult::Applied => f.write_str("applied"),
            PatchResult::Failed(why) => why.fmt(f),
        }
    }
}

/// A remote store that merges `fields` into the entity `id`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Exactly one outbound request per call.
    async fn patch(&self, id: &str, fields: &Fields) -> PatchResult;
}

/// `PATCH {base_url}/{id}` with a JSON body and optional bearer token.
#[derive(Clone)]
pub struct HttpRecordStore {
    http: HttpClient,
    base_url: Url,
    api_key: Option<String>,
}

impl HttpRecordStore {
    pub fn new(cfg: &DispatchConfig) -> Result<Self, ConfigError> {
        let base_url = cfg.resolve_base_url()?;
        let api_key = cfg.resolve_api_key()?;
        let http = HttpClient::builder().timeout(cfg.timeout).build()?;
        Ok(Self { http, base_url, api_key })
    }

    /// The id is pushed as a single, percent-encoded path segment.
    pub fn endpoint(&self, id: &str) -> Option<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut().ok()?.pop_if_empty().push(id);
        Some(url)
    }
}

#[async_trait]
impl RecordStore for HttpRecordStore {
    async fn patch(&self, id: &str, fields: &Fields) -> PatchResult {
        let log = telemetry::apply();
        let Some(url) = self.endpoint(id) else {
            return PatchResult::Failed(PatchFailure::Transport(format!("cannot build endpoint from {}", self.base_url)));
        };

        let mut req = self.http.patch(url).json(fields);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        match req.send().await {
            Ok(resp) if resp.status().is_success() => PatchResult::Applied,
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                log.warn_kv("store rejected update", [
                    ("id", id.to_string()),
                    ("status", status.as_u16().to_string()),
                    ("body", body.chars().take(200).collect::<String>()),
                ]);
                PatchResult::Failed(PatchFailure::Status(status.as_u16()))
            }
            Err(err) if err.is_timeout() => PatchResult::Failed(PatchFailure::Timeout),
            Err(err) => PatchResult::Failed(PatchFailure::Transport(err.to_string())),
        }
    }
}
