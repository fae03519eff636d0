//! Configuration types for ghostwriter-core.
//!
//! This module defines [`EngineConfig`] (CLI-level overrides), [`ProjectConfig`]
//! (from `.ghostwriter/config.yaml`), and all sub-configuration types. During
//! engine initialization, CLI flags in `EngineConfig` take precedence over
//! values read from `ProjectConfig`, and environment variables fill in any
//! credentials the file leaves out.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::error::CoreError;
use crate::gemini::DEFAULT_GEMINI_BASE_URL;
use crate::limiter::{DEFAULT_BLOCK_DURATION, DEFAULT_MAX_REQUESTS, RateLimiter};
use crate::provider::ProviderIdentity;
use crate::search::DEFAULT_SEARCH_BASE_URL;
use crate::selection::SelectionStrategy;

/// Environment variable holding the Google API key.
pub(crate) const API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Environment variable holding the Custom Search engine id.
pub(crate) const SEARCH_ENGINE_ENV: &str = "GOOGLE_SEARCH_ENGINE_ID";

/// Model used when only an API key is configured.
pub(crate) const DEFAULT_MODEL: &str = "gemini-1.5-flash";

// ── Engine Configuration (CLI-level) ─────────────────────────

/// Engine configuration provided by the CLI layer.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use ghostwriter_core::EngineConfig;
///
/// let config = EngineConfig::builder()
///     .work_dir(PathBuf::from("/tmp/drafts"))
///     .model("gemini-1.5-pro")
///     .build();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
pub struct EngineConfig {
    /// Directory holding `.ghostwriter/` state.
    work_dir: PathBuf,

    /// Force a single model for every call (takes precedence over config.yaml).
    #[builder(default, setter(strip_option, into))]
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,

    /// Override the provider request timeout in seconds.
    #[builder(default, setter(strip_option))]
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_secs: Option<u64>,
}

impl EngineConfig {
    /// Returns the working directory.
    pub fn work_dir(&self) -> &PathBuf {
        &self.work_dir
    }

    /// Returns the model override, if set.
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Returns the timeout override, if set.
    pub fn timeout_secs(&self) -> Option<u64> {
        self.timeout_secs
    }

    /// Returns the `.ghostwriter` directory path.
    pub fn state_dir(&self) -> PathBuf {
        self.work_dir.join(".ghostwriter")
    }

    /// Returns the path to `config.yaml` inside the state directory.
    pub fn config_path(&self) -> PathBuf {
        self.state_dir().join("config.yaml")
    }

    /// Returns the path of the persisted session.
    pub fn session_path(&self) -> PathBuf {
        self.state_dir().join("session.json")
    }
}

// ── Project Configuration (.ghostwriter/config.yaml) ─────────

/// Project-level configuration, deserialized from `.ghostwriter/config.yaml`.
///
/// All fields have serde defaults so that missing keys in the YAML file
/// produce valid configuration with sensible defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    /// Text-generation provider settings.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Originality-check search settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Session throttling.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Prompt template search paths.
    #[serde(default)]
    pub prompts: PromptsConfig,
}

/// Text-generation provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// API base URL.
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    /// How an identity is chosen from the pool for each call.
    #[serde(default)]
    pub selection: SelectionStrategy,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Model/credential pairs. Empty means "use `GOOGLE_API_KEY`".
    #[serde(default)]
    pub pool: Vec<PoolEntry>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_gemini_base_url(),
            selection: SelectionStrategy::default(),
            timeout_secs: default_timeout_secs(),
            pool: Vec::new(),
        }
    }
}

/// One model/credential pair in the generation pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolEntry {
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// API key. Falls back to `GOOGLE_API_KEY` when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Custom Search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchConfig {
    /// API base URL.
    #[serde(default = "default_search_base_url")]
    pub base_url: String,

    /// API key. Falls back to `GOOGLE_API_KEY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Search engine id. Falls back to `GOOGLE_SEARCH_ENGINE_ID`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_id: Option<String>,

    /// Maximum number of hits shown for a "similar content" outcome.
    #[serde(default = "default_display_limit")]
    pub display_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: default_search_base_url(),
            api_key: None,
            engine_id: None,
            display_limit: default_display_limit(),
        }
    }
}

/// Session throttling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitsConfig {
    /// Generation calls allowed before a cooldown.
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Cooldown length in seconds.
    #[serde(default = "default_block_duration_secs")]
    pub block_duration_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            block_duration_secs: default_block_duration_secs(),
        }
    }
}

impl LimitsConfig {
    /// Build the rate limiter these limits describe.
    pub fn rate_limiter(&self) -> RateLimiter {
        RateLimiter::new(
            self.max_requests,
            Duration::from_secs(self.block_duration_secs),
        )
    }
}

/// Prompt template configuration.
///
/// Templates found in these directories replace built-in templates with the
/// same name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptsConfig {
    /// Additional template directories to search (in order).
    #[serde(default)]
    pub include: Vec<PathBuf>,
}

// ── Default value functions for serde ────────────────────────

fn default_gemini_base_url() -> String {
    DEFAULT_GEMINI_BASE_URL.to_owned()
}

fn default_search_base_url() -> String {
    DEFAULT_SEARCH_BASE_URL.to_owned()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_owned()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_display_limit() -> usize {
    5
}

fn default_max_requests() -> u32 {
    DEFAULT_MAX_REQUESTS
}

fn default_block_duration_secs() -> u64 {
    DEFAULT_BLOCK_DURATION.as_secs()
}

// ── Config loading and resolution ────────────────────────────

/// Load [`ProjectConfig`] from the `.ghostwriter/config.yaml` file.
///
/// If the file does not exist, returns the default configuration.
///
/// # Errors
///
/// Returns `CoreError::Io` if the file exists but cannot be read.
/// Returns `CoreError::Yaml` if the file contains invalid YAML.
pub fn load_project_config(config_path: &Path) -> Result<ProjectConfig, CoreError> {
    if !config_path.exists() {
        return Ok(ProjectConfig::default());
    }
    let content = std::fs::read_to_string(config_path)?;
    let config: ProjectConfig = serde_yaml::from_str(&content)?;
    Ok(config)
}

/// Settings after merging CLI overrides, the config file and the environment.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedConfig {
    pub identities: Vec<ProviderIdentity>,
    pub selection: SelectionStrategy,
    pub timeout: Duration,
    pub display_limit: usize,
    pub search_key: String,
    pub search_engine_id: String,
}

impl ResolvedConfig {
    /// Merge configuration sources. `env` looks up environment variables.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Config` if no generation credential or no search
    /// credential can be found, or if the timeout or display limit is zero.
    pub(crate) fn resolve(
        config: &EngineConfig,
        project: &ProjectConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, CoreError> {
        let env_key = env(API_KEY_ENV).filter(|k| !k.is_empty());

        let mut identities = if project.generation.pool.is_empty() {
            env_key
                .iter()
                .map(|key| ProviderIdentity::new(DEFAULT_MODEL, key.clone()))
                .collect::<Vec<_>>()
        } else {
            project
                .generation
                .pool
                .iter()
                .map(|entry| {
                    let key = entry.api_key.clone().or_else(|| env_key.clone()).ok_or_else(|| {
                        CoreError::Config(format!(
                            "no API key for model {} (set apiKey or {API_KEY_ENV})",
                            entry.model
                        ))
                    })?;
                    Ok(ProviderIdentity::new(entry.model.clone(), key))
                })
                .collect::<Result<Vec<_>, CoreError>>()?
        };

        let mut selection = project.generation.selection;
        if let Some(model) = config.model() {
            // A forced model pins the first credential.
            identities.truncate(1);
            for identity in &mut identities {
                identity.model = model.to_owned();
            }
            selection = SelectionStrategy::Fixed;
        }

        if identities.is_empty() {
            return Err(CoreError::Config(format!(
                "no generation credentials configured. Set {API_KEY_ENV} or add \
                 generation.pool to .ghostwriter/config.yaml"
            )));
        }

        let search_key = project
            .search
            .api_key
            .clone()
            .or(env_key)
            .ok_or_else(|| {
                CoreError::Config(format!(
                    "no search API key configured. Set {API_KEY_ENV} or search.apiKey"
                ))
            })?;
        let search_engine_id = project
            .search
            .engine_id
            .clone()
            .or_else(|| env(SEARCH_ENGINE_ENV).filter(|id| !id.is_empty()))
            .ok_or_else(|| {
                CoreError::Config(format!(
                    "no search engine id configured. Set {SEARCH_ENGINE_ENV} or search.engineId"
                ))
            })?;

        let timeout_secs = config
            .timeout_secs()
            .unwrap_or(project.generation.timeout_secs);
        if timeout_secs == 0 {
            return Err(CoreError::Config(
                "timeout must be at least 1 second (generation.timeoutSecs or --timeout)"
                    .to_owned(),
            ));
        }
        let display_limit = project.search.display_limit;
        if display_limit == 0 {
            return Err(CoreError::Config(
                "search.displayLimit must be at least 1".to_owned(),
            ));
        }

        Ok(Self {
            identities,
            selection,
            timeout: Duration::from_secs(timeout_secs),
            display_limit,
            search_key,
            search_engine_id,
        })
    }
}
