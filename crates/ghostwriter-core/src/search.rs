//! Google Custom Search client used for originality checks.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::{CoreError, SearchError};
use crate::provider::SearchProvider;

/// Default Custom Search endpoint.
pub(crate) const DEFAULT_SEARCH_BASE_URL: &str = "https://www.googleapis.com";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Title shown for hits the provider returned without one.
const UNTITLED: &str = "Untitled result";

/// One web hit returned by the search provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default = "untitled")]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

fn untitled() -> String {
    UNTITLED.to_owned()
}

/// Calls the Custom Search JSON API.
#[derive(Clone)]
pub struct GoogleSearchProvider {
    client: Client,
    base_url: String,
    api_key: String,
    engine_id: String,
}

impl std::fmt::Debug for GoogleSearchProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleSearchProvider")
            .field("base_url", &self.base_url)
            .field("engine_id", &self.engine_id)
            .finish_non_exhaustive()
    }
}

impl GoogleSearchProvider {
    /// Create a provider with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::HttpClient` if the client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        engine_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CoreError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::HttpClient(format!("failed to create HTTP client: {e}")))?;
        Ok(Self::with_client(client, base_url, api_key, engine_id))
    }

    /// Create a provider around an existing HTTP client.
    pub fn with_client(
        client: Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        engine_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_key: api_key.into(),
            engine_id: engine_id.into(),
        }
    }
}

#[async_trait]
impl SearchProvider for GoogleSearchProvider {
    #[instrument(skip_all, fields(query_len = query.len()))]
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let url = format!("{}/customsearch/v1", self.base_url);
        let response = self
            .client
            .get(url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
            ])
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "search request failed");
                SearchError::Transport(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SearchError::Transport(e.to_string()))?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "search provider returned error status");
            return Err(SearchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SearchResponse = serde_json::from_str(&body)
            .map_err(|e| SearchError::Malformed(format!("failed to parse response: {e}")))?;
        debug!(hits = parsed.items.len(), "search finished");
        Ok(parsed.items)
    }
}

/// Only `items` matters; the API omits it entirely when nothing matched.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchResult>,
}
