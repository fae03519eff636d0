//! Gemini `generateContent` client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::{CoreError, ProviderFailure};
use crate::provider::{Completion, GenerationProvider, ProviderIdentity};

/// Default Gemini API endpoint.
pub(crate) const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Connection timeout applied on top of the per-request timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Calls the Gemini REST API.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    base_url: String,
}

impl GeminiProvider {
    /// Create a provider with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::HttpClient` if the client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CoreError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::HttpClient(format!("failed to create HTTP client: {e}")))?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a provider around an existing HTTP client.
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{model}:generateContent", self.base_url)
    }
}

#[async_trait]
impl GenerationProvider for GeminiProvider {
    #[instrument(skip(self, prompt), fields(model = %identity.model))]
    async fn complete(
        &self,
        identity: &ProviderIdentity,
        prompt: &str,
    ) -> Result<Completion, ProviderFailure> {
        let request = GenerateContentRequest::user(prompt);

        let response = self
            .client
            .post(self.endpoint(&identity.model))
            .query(&[("key", identity.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "generation request failed");
                ProviderFailure::from_reqwest(&e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|e| ProviderFailure::from_reqwest(&e))?;
            warn!(status = status.as_u16(), "generation provider returned error status");
            return Err(ProviderFailure::from_status(status.as_u16(), body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderFailure::from_reqwest(&e))?;
        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderFailure::Malformed(format!("failed to parse response: {e}")))?;

        let completion = parsed.into_completion();
        debug!(
            empty = matches!(completion, Completion::Empty { .. }),
            "generation finished"
        );
        Ok(completion)
    }
}

// ── Wire types ───────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

impl<'a> GenerateContentRequest<'a> {
    fn user(text: &'a str) -> Self {
        Self {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text }],
            }],
        }
    }
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Join the text parts of the first candidate.
    fn into_completion(self) -> Completion {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Completion::Empty {
                reason: format!("prompt blocked: {reason}"),
            };
        }

        let Some(candidate) = self.candidates.into_iter().next() else {
            return Completion::Empty {
                reason: "no candidates returned".to_owned(),
            };
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        let text = text.trim();

        if text.is_empty() {
            let reason = match candidate.finish_reason {
                Some(r) => format!("finished with {r}"),
                None => "empty response".to_owned(),
            };
            return Completion::Empty { reason };
        }
        Completion::Text(text.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_support::serve_once;

    fn parse(value: serde_json::Value) -> Completion {
        serde_json::from_value::<GenerateContentResponse>(value)
            .expect("should parse")
            .into_completion()
    }

    #[test]
    fn test_should_serialize_user_request() {
        let request = GenerateContentRequest::user("Write a haiku about rain");
        let value = serde_json::to_value(&request).expect("should serialize");
        assert_eq!(
            value,
            json!({
                "contents": [
                    { "role": "user", "parts": [{ "text": "Write a haiku about rain" }] }
                ]
            })
        );
    }

    #[test]
    fn test_should_join_and_trim_candidate_parts() {
        let completion = parse(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "  Soft rain " }, { "text": "on tin roofs\n" }] },
                "finishReason": "STOP"
            }]
        }));
        assert_eq!(completion, Completion::Text("Soft rain on tin roofs".to_owned()));
    }

    #[test]
    fn test_should_treat_missing_candidates_as_empty() {
        assert!(matches!(parse(json!({})), Completion::Empty { .. }));
    }

    #[test]
    fn test_should_report_block_reason() {
        let completion = parse(json!({ "promptFeedback": { "blockReason": "SAFETY" } }));
        assert_eq!(
            completion,
            Completion::Empty {
                reason: "prompt blocked: SAFETY".to_owned()
            }
        );
    }

    #[test]
    fn test_should_report_finish_reason_for_textless_candidate() {
        let completion = parse(json!({
            "candidates": [{ "finishReason": "RECITATION" }]
        }));
        assert_eq!(
            completion,
            Completion::Empty {
                reason: "finished with RECITATION".to_owned()
            }
        );
    }

    #[test]
    fn test_should_strip_trailing_slash_from_base_url() {
        let provider =
            GeminiProvider::with_client(crate::test_support::client(), "http://localhost:1/");
        assert_eq!(
            provider.endpoint("gemini-1.5-flash"),
            "http://localhost:1/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[tokio::test]
    async fn test_should_complete_against_http_server() {
        let body = json!({
            "candidates": [{ "content": { "parts": [{ "text": "Rain on the window" }] } }]
        })
        .to_string();
        let base = serve_once("200 OK", body).await;
        let provider = GeminiProvider::with_client(crate::test_support::client(), base);

        let completion = provider
            .complete(&ProviderIdentity::new("gemini-1.5-flash", "k"), "haiku")
            .await
            .expect("should complete");
        assert_eq!(completion, Completion::Text("Rain on the window".to_owned()));
    }

    #[tokio::test]
    async fn test_should_map_forbidden_to_auth_failure() {
        let base = serve_once("403 Forbidden", "{\"error\":\"bad key\"}".to_owned()).await;
        let provider = GeminiProvider::with_client(crate::test_support::client(), base);

        let result = provider
            .complete(&ProviderIdentity::new("gemini-1.5-flash", "bad"), "haiku")
            .await;
        assert_eq!(
            result,
            Err(ProviderFailure::Auth {
                status: 403,
                body: "{\"error\":\"bad key\"}".to_owned()
            })
        );
    }

    #[tokio::test]
    async fn test_should_map_invalid_json_to_malformed() {
        let base = serve_once("200 OK", "not json".to_owned()).await;
        let provider = GeminiProvider::with_client(crate::test_support::client(), base);

        let result = provider
            .complete(&ProviderIdentity::new("gemini-1.5-flash", "k"), "haiku")
            .await;
        assert!(matches!(result, Err(ProviderFailure::Malformed(_))));
    }
}
