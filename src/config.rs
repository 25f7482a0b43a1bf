//! Runtime configuration.
//!
//! Layers, lowest priority first: built-in defaults, an optional TOML file,
//! environment variables, then CLI flags (applied by `main`).
//!
//! ```toml
//! provider = "openrouter"
//! model = "qwen/qwen2.5-vl-72b-instruct:free"
//! rounds = 2
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{ChatError, Result};
use crate::providers::{Provider, DEFAULT_ASK_MODEL, DEFAULT_MODEL};

pub const CONFIG_PATH_VAR: &str = "DIALEXA_CONFIG";
pub const ENDPOINT_VAR: &str = "DIALEXA_ENDPOINT";

#[derive(Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub provider: Provider,
    /// Overrides the provider's chat-completions URL.
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    /// Default model for `curio` and `math`.
    pub model: String,
    /// Default model for `ask`.
    pub ask_model: String,
    /// Additional round pairs in a debate after the opening exchange.
    pub rounds: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            provider: Provider::default(),
            endpoint: None,
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            ask_model: DEFAULT_ASK_MODEL.to_string(),
            rounds: 3,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("provider", &self.provider)
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("ask_model", &self.ask_model)
            .field("rounds", &self.rounds)
            .finish()
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| ChatError::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ChatError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Defaults, then `path` (or `$DIALEXA_CONFIG`), then the environment.
    ///
    /// `provider` overrides the file's provider before the API-key variable
    /// is looked up.
    pub fn load(path: Option<&Path>, provider: Option<Provider>) -> Result<Self> {
        let path: Option<PathBuf> = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from));

        let mut config = match path {
            Some(p) => {
                debug!(path = %p.display(), "loading config file");
                Self::from_file(&p)?
            }
            None => Self::default(),
        };
        if let Some(provider) = provider {
            config.provider = provider;
        }
        config.apply_env_from(|k| std::env::var(k).ok());
        Ok(config)
    }

    /// Overlay values from an environment lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup(ENDPOINT_VAR).filter(|v| !v.trim().is_empty()) {
            self.endpoint = Some(endpoint);
        }
        if let Some(key) = lookup(self.provider.api_key_var()).filter(|v| !v.trim().is_empty()) {
            self.api_key = Some(key);
        }
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or_else(|| self.provider.endpoint())
    }

    /// The bearer token, or [`ChatError::MissingApiKey`].
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ChatError::MissingApiKey {
                var: self.provider.api_key_var().to_string(),
            })
    }
}
