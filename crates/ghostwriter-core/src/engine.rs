//! Engine wiring.
//!
//! The [`Engine`] is the main entry point for ghostwriter-core. It loads
//! configuration, builds the HTTP providers and prompt manager, and exposes
//! the [`Workflow`] together with the [`SessionStore`] it persists to.

use std::path::Path;
use std::sync::Arc;

use ghostwriter_pm::PromptManager;
use tracing::{debug, info, instrument};

use crate::config::{
    EngineConfig, ProjectConfig, PromptsConfig, ResolvedConfig, load_project_config,
};
use crate::error::CoreError;
use crate::gemini::GeminiProvider;
use crate::search::GoogleSearchProvider;
use crate::selection::ProviderPool;
use crate::session::SessionStore;
use crate::workflow::Workflow;

/// Core engine that drives the generation workflow.
///
/// # Examples
///
/// ```no_run
/// use std::path::PathBuf;
/// use ghostwriter_core::{Engine, EngineConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = EngineConfig::builder()
///     .work_dir(PathBuf::from("."))
///     .build();
///
/// let engine = Engine::new(config)?;
/// let mut session = engine.session_store().load()?;
/// let content = engine.workflow().generate(&mut session, "Write a haiku about rain").await?;
/// engine.session_store().save(&session)?;
/// # let _ = content;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Engine {
    /// CLI-level configuration.
    config: EngineConfig,
    /// Project-level configuration from `.ghostwriter/config.yaml`.
    project_config: ProjectConfig,
    /// Generation workflow with real providers.
    workflow: Workflow,
    /// Session persistence.
    sessions: SessionStore,
}

impl Engine {
    /// Create a new engine, reading credentials from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Yaml` if the config file exists but is invalid.
    /// Returns `CoreError::Config` if credentials are missing.
    /// Returns `CoreError::Prompt` if prompt templates cannot be loaded.
    pub fn new(config: EngineConfig) -> Result<Self, CoreError> {
        Self::with_env(config, |name| std::env::var(name).ok())
    }

    /// Create a new engine with a custom environment lookup.
    #[instrument(skip_all)]
    pub fn with_env(
        config: EngineConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, CoreError> {
        info!(work_dir = %config.work_dir().display(), "initializing engine");

        let project_config = load_project_config(&config.config_path())?;
        let resolved = ResolvedConfig::resolve(&config, &project_config, env)?;

        let prompts = load_prompts(config.work_dir(), &project_config.prompts)?;

        let generator = GeminiProvider::new(
            project_config.generation.base_url.clone(),
            resolved.timeout,
        )?;
        let search = GoogleSearchProvider::new(
            project_config.search.base_url.clone(),
            resolved.search_key,
            resolved.search_engine_id,
            resolved.timeout,
        )?;
        let pool = ProviderPool::new(resolved.identities, resolved.selection)?;
        debug!(
            identities = pool.identities().len(),
            strategy = ?pool.strategy(),
            "provider pool ready"
        );

        let workflow = Workflow::builder()
            .generator(Arc::new(generator))
            .search(Arc::new(search))
            .pool(pool)
            .prompts(prompts)
            .limiter(project_config.limits.rate_limiter())
            .display_limit(resolved.display_limit)
            .call_timeout(resolved.timeout)
            .build();

        let sessions = SessionStore::new(config.session_path());

        Ok(Self {
            config,
            project_config,
            workflow,
            sessions,
        })
    }

    /// Returns the generation workflow.
    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// Returns the session store.
    pub fn session_store(&self) -> &SessionStore {
        &self.sessions
    }

    /// Returns a reference to the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns a reference to the project configuration.
    pub fn project_config(&self) -> &ProjectConfig {
        &self.project_config
    }
}

/// Build the prompt manager: built-in templates plus configured include dirs.
///
/// Relative include paths resolve against `work_dir`; missing directories
/// are skipped.
///
/// # Errors
///
/// Returns `CoreError::Prompt` if a template file is invalid.
pub fn load_prompts(work_dir: &Path, prompts: &PromptsConfig) -> Result<PromptManager, CoreError> {
    let mut manager = PromptManager::new()?;
    for dir in &prompts.include {
        let dir = if dir.is_absolute() {
            dir.clone()
        } else {
            work_dir.join(dir)
        };
        if dir.is_dir() {
            manager.load_dir(&dir)?;
            debug!(dir = %dir.display(), "loaded custom prompt directory");
        }
    }
    Ok(manager)
}
