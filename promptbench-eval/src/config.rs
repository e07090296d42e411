//! TOML configuration files.
//!
//! Config files are loaded in priority order (later overrides earlier):
//! 1. `~/.promptbench/config.toml` - User-global defaults
//! 2. `./promptbench.toml` - Project-local overrides
//!
//! Command-line flags override both.
//!
//! # Example Config File
//!
//! ```toml
//! [llm]
//! model = "gpt-4o"
//! base_url = "https://api.openai.com/v1"
//! temperature = 0.0
//! timeout_secs = 60
//! max_retries = 3
//! retry_delay_secs = 2.0
//!
//! [eval]
//! match_method = "fuzzy"
//! inter_item_delay_secs = 1.0
//! transcript_dir = "results"
//! ```

use crate::harness::EvalConfig;
use crate::matcher::MatchMethod;
use promptbench_core::LlmConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors from reading a config file.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("Failed to read {path}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse {path}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Root of a `promptbench.toml` file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
#[non_exhaustive]
pub struct PromptbenchConfig {
    /// Endpoint and retry settings
    pub llm: Option<LlmToml>,

    /// Evaluation run settings
    pub eval: Option<EvalToml>,
}

impl PromptbenchConfig {
    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: PromptbenchConfig) {
        if let Some(llm) = other.llm {
            match &mut self.llm {
                Some(existing) => existing.merge(llm),
                None => self.llm = Some(llm),
            }
        }
        if let Some(eval) = other.eval {
            match &mut self.eval {
                Some(existing) => existing.merge(eval),
                None => self.eval = Some(eval),
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.llm.is_none() && self.eval.is_none()
    }

    /// Defaults with every file override applied.
    pub fn to_llm_config(&self) -> LlmConfig {
        match &self.llm {
            Some(llm) => llm.apply(LlmConfig::default()),
            None => LlmConfig::default(),
        }
    }

    /// Evaluation settings derived from the `[llm]` and `[eval]` sections.
    pub fn to_eval_config(&self) -> EvalConfig {
        let config = EvalConfig::from_llm_config(&self.to_llm_config());
        match &self.eval {
            Some(eval) => eval.apply(config),
            None => config,
        }
    }
}

/// `[llm]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
#[non_exhaustive]
pub struct LlmToml {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
    pub timeout_secs: Option<u64>,
    pub max_tokens: Option<u32>,
    pub max_retries: Option<u32>,
    pub retry_delay_secs: Option<f64>,
}

impl LlmToml {
    /// Merge another config into this one (other takes precedence for Some values).
    pub fn merge(&mut self, other: LlmToml) {
        if other.model.is_some() {
            self.model = other.model;
        }
        if other.base_url.is_some() {
            self.base_url = other.base_url;
        }
        if other.temperature.is_some() {
            self.temperature = other.temperature;
        }
        if other.timeout_secs.is_some() {
            self.timeout_secs = other.timeout_secs;
        }
        if other.max_tokens.is_some() {
            self.max_tokens = other.max_tokens;
        }
        if other.max_retries.is_some() {
            self.max_retries = other.max_retries;
        }
        if other.retry_delay_secs.is_some() {
            self.retry_delay_secs = other.retry_delay_secs;
        }
    }

    fn apply(&self, mut config: LlmConfig) -> LlmConfig {
        if let Some(v) = &self.model {
            config = config.with_model(v.clone());
        }
        if let Some(v) = &self.base_url {
            config = config.with_base_url(v.clone());
        }
        if let Some(v) = self.temperature {
            config = config.with_temperature(v);
        }
        if let Some(v) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(v));
        }
        if let Some(v) = self.max_tokens {
            config = config.with_max_tokens(v);
        }
        if let Some(v) = self.max_retries {
            config = config.with_max_retries(v);
        }
        if let Some(d) = self.retry_delay_secs.and_then(secs_to_duration) {
            config = config.with_retry_delay(d);
        }
        config
    }
}

/// `[eval]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
#[non_exhaustive]
pub struct EvalToml {
    pub match_method: Option<MatchMethod>,
    pub inter_item_delay_secs: Option<f64>,
    pub sample: Option<usize>,
    pub transcript_dir: Option<PathBuf>,
    pub show_details: Option<bool>,
}

impl EvalToml {
    /// Merge another config into this one (other takes precedence for Some values).
    pub fn merge(&mut self, other: EvalToml) {
        if other.match_method.is_some() {
            self.match_method = other.match_method;
        }
        if other.inter_item_delay_secs.is_some() {
            self.inter_item_delay_secs = other.inter_item_delay_secs;
        }
        if other.sample.is_some() {
            self.sample = other.sample;
        }
        if other.transcript_dir.is_some() {
            self.transcript_dir = other.transcript_dir;
        }
        if other.show_details.is_some() {
            self.show_details = other.show_details;
        }
    }

    fn apply(&self, mut config: EvalConfig) -> EvalConfig {
        if let Some(v) = &self.match_method {
            config = config.with_match_method(v.clone());
        }
        if let Some(d) = self.inter_item_delay_secs.and_then(secs_to_duration) {
            config = config.with_inter_item_delay(d);
        }
        config
    }
}

/// Negative or non-finite values are ignored with a warning.
fn secs_to_duration(secs: f64) -> Option<Duration> {
    match Duration::try_from_secs_f64(secs) {
        Ok(d) => Some(d),
        Err(e) => {
            log::warn!("Ignoring invalid duration {} in config: {}", secs, e);
            None
        }
    }
}

/// Finds and loads config files.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// User-global config (~/.promptbench/config.toml)
    global_path: PathBuf,

    /// Project-local config (./promptbench.toml)
    local_path: PathBuf,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a loader for the standard locations.
    pub fn new() -> Self {
        Self::with_paths(Self::global_config_path(), Self::local_config_path())
    }

    /// Create a loader for explicit global and local paths.
    pub fn with_paths(global_path: PathBuf, local_path: PathBuf) -> Self {
        Self {
            global_path,
            local_path,
        }
    }

    /// Get the path to the user-global config file.
    pub fn global_config_path() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".promptbench").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from(".promptbench/config.toml"))
    }

    /// Get the path to the project-local config file.
    pub fn local_config_path() -> PathBuf {
        PathBuf::from("promptbench.toml")
    }

    /// Load and merge the global then the local file.
    ///
    /// Missing files are skipped; unreadable or invalid ones are logged and
    /// skipped. Returns the merged config and the files that were applied.
    pub fn load(&self) -> (PromptbenchConfig, Vec<PathBuf>) {
        let mut config = PromptbenchConfig::default();
        let mut loaded_files = Vec::new();

        for (scope, path) in [("global", &self.global_path), ("local", &self.local_path)] {
            if !path.exists() {
                continue;
            }
            match Self::load_file(path) {
                Ok(file_config) => {
                    config.merge(file_config);
                    loaded_files.push(path.clone());
                }
                Err(e) => {
                    log::warn!("Failed to load {} config {}: {}", scope, path.display(), e);
                }
            }
        }

        (config, loaded_files)
    }

    /// Load a single config file.
    pub fn load_file(path: &Path) -> Result<PromptbenchConfig, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }
}
