//! Generation workflow.
//!
//! Validates a prompt, consults the [`RateLimiter`], calls the generation
//! provider with an identity drawn from the [`ProviderPool`], and checks the
//! result against the search provider. [`Workflow::regenerate`] rewrites the
//! last result to reduce overlap with what the search found.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ghostwriter_pm::PromptManager;
use tracing::{info, instrument, warn};
use typed_builder::TypedBuilder;

use crate::error::{GenerationError, ProviderFailure, SearchError};
use crate::limiter::{Decision, RateLimiter};
use crate::provider::{Completion, GenerationProvider, SearchProvider};
use crate::search::SearchResult;
use crate::selection::ProviderPool;
use crate::session::Session;

/// Number of search hits shown for a "similar content" outcome by default.
const DEFAULT_DISPLAY_LIMIT: usize = 5;

/// Upper bound on any single provider call.
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Orchestrates generation, originality checks and rewrites for a session.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use ghostwriter_core::{
///     GeminiProvider, GoogleSearchProvider, ProviderIdentity, ProviderPool, Session, Workflow,
/// };
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let timeout = Duration::from_secs(30);
/// let workflow = Workflow::builder()
///     .generator(Arc::new(GeminiProvider::new(
///         "https://generativelanguage.googleapis.com",
///         timeout,
///     )?))
///     .search(Arc::new(GoogleSearchProvider::new(
///         "https://www.googleapis.com",
///         "api-key",
///         "engine-id",
///         timeout,
///     )?))
///     .pool(ProviderPool::single(ProviderIdentity::new("gemini-1.5-flash", "api-key")))
///     .prompts(ghostwriter_pm::PromptManager::new()?)
///     .build();
///
/// let mut session = Session::new();
/// let content = workflow.generate(&mut session, "Write a haiku about rain").await?;
/// println!("{}", content.text);
/// # Ok(())
/// # }
/// ```
#[derive(TypedBuilder)]
pub struct Workflow {
    generator: Arc<dyn GenerationProvider>,
    search: Arc<dyn SearchProvider>,
    pool: ProviderPool,
    prompts: PromptManager,
    #[builder(default)]
    limiter: RateLimiter,
    #[builder(default = DEFAULT_DISPLAY_LIMIT)]
    display_limit: usize,
    #[builder(default = DEFAULT_CALL_TIMEOUT)]
    call_timeout: Duration,
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("pool", &self.pool)
            .field("limiter", &self.limiter)
            .field("display_limit", &self.display_limit)
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

/// Generated text plus the outcome of its originality check.
#[derive(Debug, Clone)]
pub struct GeneratedContent {
    /// Generated text, or a placeholder when the provider returned none.
    pub text: String,
    /// Model that produced the text.
    pub model: String,
    /// Whether `text` is a placeholder rather than provider output.
    pub placeholder: bool,
    /// Result of searching the web for the text.
    pub search: SearchOutcome,
    display_limit: usize,
}

impl GeneratedContent {
    /// Originality verdict, with hits capped at the display limit.
    pub fn originality(&self) -> Originality<'_> {
        self.search.originality(self.display_limit)
    }
}

/// What the search provider said about a piece of generated text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Hits in ranked order; empty means nothing similar was found.
    Results(Vec<SearchResult>),
    /// The search failed; the generated text is still valid.
    Error(SearchError),
    /// No search was run (placeholder text).
    Skipped,
}

impl SearchOutcome {
    /// Binary originality decision: any hit means "similar content found".
    pub fn originality(&self, display_limit: usize) -> Originality<'_> {
        match self {
            Self::Results(hits) if hits.is_empty() => Originality::Original,
            Self::Results(hits) => Originality::SimilarFound {
                total: hits.len(),
                shown: &hits[..hits.len().min(display_limit)],
            },
            Self::Error(_) | Self::Skipped => Originality::Unchecked,
        }
    }
}

/// Originality verdict for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Originality<'a> {
    /// No similar content was found online.
    Original,
    /// Similar content exists; `shown` holds the top hits.
    SimilarFound {
        total: usize,
        shown: &'a [SearchResult],
    },
    /// The check could not be performed.
    Unchecked,
}

impl Workflow {
    /// Generate content for `prompt` and check it for originality.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError::EmptyPrompt` for blank prompts, without
    /// touching the session or any provider.
    /// Returns `GenerationError::RateLimited` while the session is cooling down.
    /// Returns `GenerationError::ProviderFailure` if the generation call fails.
    /// Search failures are not errors; they are reported in
    /// [`GeneratedContent::search`].
    #[instrument(skip_all, fields(prompt_len = prompt.len()))]
    pub async fn generate(
        &self,
        session: &mut Session,
        prompt: &str,
    ) -> Result<GeneratedContent, GenerationError> {
        if prompt.trim().is_empty() {
            return Err(GenerationError::EmptyPrompt);
        }
        self.admit(session)?;

        let (completion, model) = self.complete(prompt).await?;
        session.request_count += 1;
        info!(count = session.request_count, %model, "generation succeeded");

        let text = match completion {
            Completion::Text(text) => text,
            Completion::Empty { reason } => {
                warn!(%reason, "provider returned no text");
                return Ok(GeneratedContent {
                    text: Completion::placeholder(&reason),
                    model,
                    placeholder: true,
                    search: SearchOutcome::Skipped,
                    display_limit: self.display_limit,
                });
            }
        };
        session.last_generated_text = Some(text.clone());

        let search = match self.search_for(&text).await {
            Ok(hits) => SearchOutcome::Results(hits),
            Err(e) => {
                warn!(error = %e, "originality check failed");
                SearchOutcome::Error(e)
            }
        };

        Ok(GeneratedContent {
            text,
            model,
            placeholder: false,
            search,
            display_limit: self.display_limit,
        })
    }

    /// Render a content template and generate from it.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError::Prompt` if the template is unknown or a
    /// required variable is missing, plus everything [`generate`](Self::generate)
    /// returns.
    #[instrument(skip(self, session, vars))]
    pub async fn generate_from_template(
        &self,
        session: &mut Session,
        template: &str,
        vars: &serde_json::Value,
    ) -> Result<GeneratedContent, GenerationError> {
        let prompt = self.prompts.render(template, vars)?;
        self.generate(session, &prompt).await
    }

    /// Rewrite the session's last generated text for originality.
    ///
    /// Consumes a rate-limit slot like any other generation. The search check
    /// is not re-run.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError::NothingToRegenerate` if nothing was generated yet.
    /// Returns `GenerationError::RateLimited` while the session is cooling down.
    /// Returns `GenerationError::ProviderFailure` if the rewrite call fails.
    #[instrument(skip_all)]
    pub async fn regenerate(&self, session: &mut Session) -> Result<String, GenerationError> {
        let original = session
            .last_generated_text
            .as_deref()
            .ok_or(GenerationError::NothingToRegenerate)?;
        let instruction = self.prompts.rewrite_instruction(original)?;
        self.admit(session)?;

        let (completion, model) = self.complete(&instruction).await?;
        session.request_count += 1;
        info!(count = session.request_count, %model, "regeneration succeeded");

        match completion {
            Completion::Text(text) => {
                session.last_generated_text = Some(text.clone());
                Ok(text)
            }
            Completion::Empty { reason } => {
                warn!(%reason, "provider returned no text for rewrite");
                Ok(Completion::placeholder(&reason))
            }
        }
    }

    /// Search the web for `text` without generating anything.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError::EmptyPrompt` for blank text.
    /// Returns `GenerationError::SearchProvider` if the search fails.
    #[instrument(skip_all, fields(text_len = text.len()))]
    pub async fn check_originality(
        &self,
        text: &str,
    ) -> Result<SearchOutcome, GenerationError> {
        if text.trim().is_empty() {
            return Err(GenerationError::EmptyPrompt);
        }
        let hits = self.search_for(text).await?;
        Ok(SearchOutcome::Results(hits))
    }

    /// Returns the prompt manager.
    pub fn prompts(&self) -> &PromptManager {
        &self.prompts
    }

    /// Returns the rate limiter.
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Returns the number of hits shown for similar content.
    pub fn display_limit(&self) -> usize {
        self.display_limit
    }

    fn admit(&self, session: &mut Session) -> Result<(), GenerationError> {
        match self.limiter.check_and_admit(session, Utc::now()) {
            Decision::Admit => Ok(()),
            Decision::Blocked { remaining_secs } => {
                info!(remaining_secs, "generation refused, session cooling down");
                Err(GenerationError::RateLimited { remaining_secs })
            }
        }
    }

    async fn complete(&self, prompt: &str) -> Result<(Completion, String), ProviderFailure> {
        let identity = self.pool.select();
        let completion = with_timeout(
            self.call_timeout,
            self.generator.complete(identity, prompt),
            || ProviderFailure::Timeout,
        )
        .await?;
        Ok((completion, identity.model.clone()))
    }

    async fn search_for(&self, text: &str) -> Result<Vec<SearchResult>, SearchError> {
        with_timeout(self.call_timeout, self.search.search(text), || {
            SearchError::Transport("search timed out".to_owned())
        })
        .await
    }
}

async fn with_timeout<T, E>(
    limit: Duration,
    call: impl Future<Output = Result<T, E>>,
    on_timeout: impl FnOnce() -> E,
) -> Result<T, E> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout()),
    }
}
