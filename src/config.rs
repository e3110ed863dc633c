use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::dimensions::ConfidenceBoost;
use crate::pipeline::vision::ollama_types::{validate_base_url, validate_model_name};
use crate::pipeline::vision::TurnMarkerFormat;

/// Application-level constants
pub const APP_NAME: &str = "dimscan";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Explicit config file path.
pub const CONFIG_ENV: &str = "DIMSCAN_CONFIG";
/// Overrides `base_url` from the config file.
pub const BASE_URL_ENV: &str = "DIMSCAN_BASE_URL";
/// Overrides `model` from the config file.
pub const MODEL_ENV: &str = "DIMSCAN_MODEL";

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// LLaVA 1.6 (Mistral 7B) as packaged by Ollama.
pub const DEFAULT_OLLAMA_MODEL: &str = "llava:7b";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";

/// Default `tracing` filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "dimscan=info,warn"
}

/// Per-user config directory: `<config_dir>/dimscan/`.
pub fn app_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME))
}

/// Config file picked up by `discover()` when no explicit path is given.
pub fn default_config_path() -> Option<PathBuf> {
    app_config_dir().map(|dir| dir.join("config.json"))
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Which vision-language backend answers the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Local Ollama instance (`/api/chat` with base64 images).
    Ollama,
    /// OpenAI-compatible chat completions endpoint.
    OpenAi,
}

/// Analyzer configuration, loaded from JSON.
///
/// Every field has a default, so `{}` is a valid config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub backend: BackendKind,
    /// None = backend default (`DEFAULT_OLLAMA_URL` / `DEFAULT_OPENAI_URL`).
    pub base_url: Option<String>,
    /// None = backend default model.
    pub model: Option<String>,
    /// Upper bound for a single inference call.
    pub timeout_secs: u64,
    /// Environment variable holding the API key (OpenAI backend only).
    pub api_key_env: String,
    /// Ollama `keep_alive` while the handle is open.
    pub keep_alive: String,
    /// How turn markers are stripped from raw completions.
    pub turn_markers: TurnMarkerFormat,
    /// Substring allow-list that nudges dimension confidence upward.
    pub boost: ConfidenceBoost,
    /// Upscale factor when rasterizing the first PDF page.
    pub pdf_scale: f32,
    /// Worker threads for batch mode (one inference in flight per worker).
    pub workers: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Ollama,
            base_url: None,
            model: None,
            timeout_secs: 300,
            api_key_env: "OPENAI_API_KEY".to_string(),
            keep_alive: "30m".to_string(),
            turn_markers: TurnMarkerFormat::Auto,
            boost: ConfidenceBoost::default(),
            pdf_scale: 2.0,
            workers: 1,
        }
    }
}

impl AnalyzerConfig {
    /// Load a config from an explicit JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolve the effective config.
    ///
    /// Order: explicit path, then `DIMSCAN_CONFIG`, then the per-user config
    /// file if it exists, then defaults. Environment overrides are applied
    /// last and the result is validated.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = explicit {
            Self::from_file(path)?
        } else if let Some(path) = std::env::var_os(CONFIG_ENV) {
            Self::from_file(PathBuf::from(path))?
        } else {
            match default_config_path() {
                Some(path) if path.exists() => Self::from_file(path)?,
                _ => Self::default(),
            }
        };

        config.apply_overrides(
            std::env::var(BASE_URL_ENV).ok(),
            std::env::var(MODEL_ENV).ok(),
        );
        config.validate()?;

        tracing::debug!(
            backend = ?config.backend,
            base_url = %config.effective_base_url(),
            model = %config.effective_model(),
            "Configuration resolved"
        );
        Ok(config)
    }

    fn apply_overrides(&mut self, base_url: Option<String>, model: Option<String>) {
        if let Some(url) = base_url.filter(|u| !u.trim().is_empty()) {
            self.base_url = Some(url);
        }
        if let Some(model) = model.filter(|m| !m.trim().is_empty()) {
            self.model = Some(model);
        }
    }

    pub fn effective_base_url(&self) -> String {
        match (&self.base_url, self.backend) {
            (Some(url), _) => url.trim_end_matches('/').to_string(),
            (None, BackendKind::Ollama) => DEFAULT_OLLAMA_URL.to_string(),
            (None, BackendKind::OpenAi) => DEFAULT_OPENAI_URL.to_string(),
        }
    }

    pub fn effective_model(&self) -> String {
        match (&self.model, self.backend) {
            (Some(model), _) => model.clone(),
            (None, BackendKind::Ollama) => DEFAULT_OLLAMA_MODEL.to_string(),
            (None, BackendKind::OpenAi) => DEFAULT_OPENAI_MODEL.to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be positive".into()));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if !(self.pdf_scale > 0.0 && self.pdf_scale <= 8.0) {
            return Err(ConfigError::Invalid(format!(
                "pdf_scale must be in (0, 8], got {}",
                self.pdf_scale
            )));
        }
        if !(0.0..=1.0).contains(&self.boost.amount) {
            return Err(ConfigError::Invalid(format!(
                "boost.amount must be in [0, 1], got {}",
                self.boost.amount
            )));
        }
        if self.backend == BackendKind::Ollama {
            validate_base_url(&self.effective_base_url())
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
            validate_model_name(&self.effective_model())
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
        Ok(())
    }
}
