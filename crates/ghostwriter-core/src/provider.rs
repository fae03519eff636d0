//! Seams to the hosted providers.
//!
//! The workflow only talks to these traits; [`GeminiProvider`](crate::GeminiProvider)
//! and [`GoogleSearchProvider`](crate::GoogleSearchProvider) are the HTTP
//! implementations used by the engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ProviderFailure, SearchError};
use crate::search::SearchResult;

/// A model name plus the credential used to call it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderIdentity {
    /// Model identifier (e.g. `gemini-1.5-flash`).
    pub model: String,
    /// API key for the model.
    pub api_key: String,
}

impl ProviderIdentity {
    /// Create an identity from a model name and credential.
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: api_key.into(),
        }
    }
}

// Keep credentials out of logs and debug output.
impl std::fmt::Debug for ProviderIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderIdentity")
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Result of a generation call that reached the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The provider produced text.
    Text(String),
    /// The provider answered without any text (e.g. a blocked prompt).
    Empty { reason: String },
}

impl Completion {
    /// Human-readable text shown in place of an empty completion.
    pub fn placeholder(reason: &str) -> String {
        format!("No content was generated ({reason}). Try rephrasing your prompt.")
    }
}

/// A hosted text-generation API.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Generate text for `prompt` using the given model and credential.
    async fn complete(
        &self,
        identity: &ProviderIdentity,
        prompt: &str,
    ) -> Result<Completion, ProviderFailure>;
}

/// A hosted web-search API.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Search the web for `query`, returning hits in ranked order.
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError>;
}
