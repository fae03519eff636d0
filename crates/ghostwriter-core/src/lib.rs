mod config;
mod engine;
mod error;
mod export;
mod gemini;
mod limiter;
mod provider;
mod search;
mod selection;
mod session;
mod workflow;

#[cfg(test)]
mod test_support;

pub use config::{
    EngineConfig, GenerationConfig, LimitsConfig, PoolEntry, ProjectConfig, PromptsConfig,
    SearchConfig, load_project_config,
};
pub use engine::{Engine, load_prompts};
pub use error::{CoreError, GenerationError, ProviderFailure, SearchError};
pub use export::{ExportFormat, export_to_file, render_export};
pub use gemini::GeminiProvider;
pub use limiter::{Decision, RateLimiter};
pub use provider::{Completion, GenerationProvider, ProviderIdentity, SearchProvider};
pub use search::{GoogleSearchProvider, SearchResult};
pub use selection::{ProviderPool, SelectionStrategy};
pub use session::{Session, SessionLease, SessionStore};
pub use workflow::{GeneratedContent, Originality, SearchOutcome, Workflow};
