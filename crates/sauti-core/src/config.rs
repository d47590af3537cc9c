//! Configuration types for hub access and processor resolution

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use tracing::warn;

use crate::error::{Error, Result};

pub const DEFAULT_ENDPOINT: &str = "https://huggingface.co";
pub const DEFAULT_REVISION: &str = "main";

/// Hub access configuration shared by every fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Directory holding the hub file cache
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Hub endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Revision used when a call does not name one
    #[serde(default = "default_revision")]
    pub revision: String,

    /// Bearer token for private or gated repositories
    #[serde(default = "default_token")]
    pub token: Option<String>,

    /// Only consult the local cache, never the network
    #[serde(default = "default_offline")]
    pub offline: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            endpoint: default_endpoint(),
            revision: default_revision(),
            token: default_token(),
            offline: default_offline(),
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn default_cache_dir() -> PathBuf {
    if let Some(from_env) = non_empty_env("SAUTI_CACHE_DIR") {
        return PathBuf::from(from_env);
    }
    if let Some(hf_home) = non_empty_env("HF_HOME") {
        return PathBuf::from(hf_home).join("hub");
    }

    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("huggingface")
        .join("hub")
}

fn default_endpoint() -> String {
    non_empty_env("HF_ENDPOINT").unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
}

fn default_revision() -> String {
    DEFAULT_REVISION.to_string()
}

fn default_token() -> Option<String> {
    non_empty_env("HF_TOKEN")
}

fn default_offline() -> bool {
    matches!(
        non_empty_env("HF_HUB_OFFLINE").as_deref(),
        Some("1") | Some("true") | Some("TRUE") | Some("yes")
    )
}

/// Per-call options for `AutoProcessor::from_pretrained`.
///
/// `overrides` holds arbitrary attribute overrides. Keys matching an attribute
/// of a loaded component update it; the rest are handed back to the caller
/// when `return_unused_kwargs` is set.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    pub cache_dir: Option<PathBuf>,
    pub force_download: bool,
    pub token: Option<String>,
    pub revision: Option<String>,
    pub trust_remote_code: Option<bool>,
    pub return_unused_kwargs: bool,
    pub overrides: Map<String, Value>,
}

impl ResolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn force_download(mut self, force: bool) -> Self {
        self.force_download = force;
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    pub fn trust_remote_code(mut self, trust: bool) -> Self {
        self.trust_remote_code = Some(trust);
        self
    }

    pub fn return_unused_kwargs(mut self, value: bool) -> Self {
        self.return_unused_kwargs = value;
        self
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    /// Folds the deprecated `use_auth_token` override into `token`.
    pub fn normalize(mut self) -> Result<Self> {
        let Some(legacy) = self.overrides.remove("use_auth_token") else {
            return Ok(self);
        };
        warn!("`use_auth_token` is deprecated, use `token` instead");
        if self.token.is_some() {
            return Err(Error::InvalidInput(
                "`token` and `use_auth_token` are both specified. Please set only `token`."
                    .to_string(),
            ));
        }
        match legacy {
            Value::String(token) => self.token = Some(token),
            Value::Null | Value::Bool(false) => {}
            Value::Bool(true) => self.token = default_token(),
            other => {
                return Err(Error::InvalidInput(format!(
                    "`use_auth_token` must be a string or a boolean, got {other}"
                )));
            }
        }
        Ok(self)
    }
}
