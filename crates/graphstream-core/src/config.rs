//! Configuration for graph streaming clients.
//!
//! Configuration is loaded from (in priority order):
//! 1. The `[stream]` section of an optional config file
//! 2. Defaults
//!
//! The environment is never consulted.

use serde::Deserialize;

use crate::error::Result;

/// Default workspace endpoint of a locally running Gephi streaming server.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080/workspace0";

/// Query string selecting the graph-update operation on the server.
pub const UPDATE_GRAPH_QUERY: (&str, &str) = ("operation", "updateGraph");

/// Config file section holding [`ClientConfig`].
pub const CONFIG_SECTION: &str = "stream";

/// Client construction settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the streaming workspace (query string is appended).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Flush after every add/change call.
    #[serde(default)]
    pub autoflush: bool,

    /// Inject a `t` Unix timestamp into every event.
    #[serde(default)]
    pub enable_timestamps: bool,

    /// HTTP request timeout in seconds. `None` keeps the HTTP client default.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            autoflush: false,
            enable_timestamps: false,
            timeout_secs: None,
        }
    }
}

impl ClientConfig {
    /// Load from the `[stream]` section of `<file_prefix>.{toml,json,yaml,...}`.
    ///
    /// A missing file or section yields the defaults.
    pub fn load(file_prefix: &str) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .build()?;
        Self::from_section(&cfg)
    }

    fn from_section(cfg: &config::Config) -> Result<Self> {
        match cfg.get::<ClientConfig>(CONFIG_SECTION) {
            Ok(c) => Ok(c),
            Err(config::ConfigError::NotFound(_)) => {
                tracing::debug!(
                    section = CONFIG_SECTION,
                    "No stream config section, using defaults"
                );
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// The full update URL: `<base_url>?operation=updateGraph`.
    ///
    /// A query already present on `base_url` is kept and the operation
    /// pair is appended to it.
    pub fn endpoint(&self) -> String {
        let (key, value) = UPDATE_GRAPH_QUERY;
        let base = self.base_url.as_str();
        let separator = match base.find('?') {
            None => "?",
            Some(at) if at + 1 == base.len() || base.ends_with('&') => "",
            Some(_) => "&",
        };
        format!("{base}{separator}{key}={value}")
    }
}
