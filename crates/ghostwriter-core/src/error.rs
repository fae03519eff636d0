use thiserror::Error;

/// Errors raised while setting up the engine or touching local state.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("session store error: {0}")]
    Session(String),

    #[error("http client error: {0}")]
    HttpClient(String),

    #[error("prompt error: {0}")]
    Prompt(#[from] ghostwriter_pm::PmError),

    #[error("invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors returned by the generation workflow.
///
/// None of these are fatal to the process: the caller reports them to the
/// user and keeps accepting actions.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("please enter a valid prompt")]
    EmptyPrompt,

    #[error("session limit reached, try again in {remaining_secs} seconds")]
    RateLimited { remaining_secs: u64 },

    #[error("error generating content: {0}")]
    ProviderFailure(#[from] ProviderFailure),

    #[error("search failed: {0}")]
    SearchProvider(#[from] SearchError),

    #[error("nothing to regenerate, generate some content first")]
    NothingToRegenerate,

    #[error("prompt error: {0}")]
    Prompt(#[from] ghostwriter_pm::PmError),
}

/// Failure of a call to the text-generation provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderFailure {
    #[error("provider timed out")]
    Timeout,

    #[error("provider rejected credentials ({status}): {body}")]
    Auth { status: u16, body: String },

    #[error("provider returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl ProviderFailure {
    /// Classify a non-success HTTP status from the provider.
    pub(crate) fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::Auth { status, body },
            _ => Self::Http { status, body },
        }
    }

    /// Classify a transport-level reqwest error.
    pub(crate) fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Malformed(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// Failure of a call to the search provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("search API error: {status} - {body}")]
    Status { status: u16, body: String },

    #[error("search request failed: {0}")]
    Transport(String),

    #[error("malformed search response: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_classify_auth_statuses() {
        assert!(matches!(
            ProviderFailure::from_status(401, "bad key".to_owned()),
            ProviderFailure::Auth { status: 401, .. }
        ));
        assert!(matches!(
            ProviderFailure::from_status(403, String::new()),
            ProviderFailure::Auth { status: 403, .. }
        ));
        assert!(matches!(
            ProviderFailure::from_status(500, String::new()),
            ProviderFailure::Http { status: 500, .. }
        ));
    }

    #[test]
    fn test_should_format_rate_limited_message() {
        let err = GenerationError::RateLimited {
            remaining_secs: 900,
        };
        assert_eq!(
            err.to_string(),
            "session limit reached, try again in 900 seconds"
        );
    }

    #[test]
    fn test_should_format_search_status_error() {
        let err = SearchError::Status {
            status: 403,
            body: "quota exceeded".to_owned(),
        };
        assert_eq!(err.to_string(), "search API error: 403 - quota exceeded");
    }
}
