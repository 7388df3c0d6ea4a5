//! Language-model query backend.
//!
//! The `gen` and `web` directives see the model only through the
//! [`QueryService`] trait, so tests substitute a scripted fake and the
//! engine never knows the transport. The one contractual subtlety is
//! rate limiting: a limited response is a *distinct signal* from a
//! hard failure, because the cache must retry the former next tick and
//! may keep the latter's error text.

use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use weft_types::ErrorCode;

/// Placeholder rendered in place of output while a query is rate
/// limited.
pub const RATE_LIMIT_PLACEHOLDER: &str = "<LLM RATE LIMIT>";

/// Which model to query, with what credential and length cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub api_key: Option<String>,
    pub max_tokens: Option<u32>,
}

/// Query backend error.
///
/// | Variant | Code | Recoverable |
/// |---------|------|-------------|
/// | [`RateLimited`](Self::RateLimited) | `QUERY_RATE_LIMITED` | Yes |
/// | [`MissingCredentials`](Self::MissingCredentials) | `QUERY_CREDENTIALS` | No |
/// | [`Http`](Self::Http) | `QUERY_HTTP` | Yes |
/// | [`Api`](Self::Api) | `QUERY_API` | No |
/// | [`MalformedResponse`](Self::MalformedResponse) | `QUERY_RESPONSE` | No |
#[derive(Debug, Error)]
pub enum QueryError {
    /// The backend asked us to slow down. Never conflate with `Api`:
    /// callers cache these two differently.
    #[error("query rate limited by backend")]
    RateLimited,

    /// No API key available from parameter, document config, or
    /// process config.
    #[error("no api key configured for model '{model}'")]
    MissingCredentials { model: String },

    /// Transport-level failure (DNS, TLS, timeout, connect).
    #[error("query transport failure: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("query rejected with status {status}: {message}")]
    Api { status: u16, message: String },

    /// A 2xx response without the expected completion payload.
    #[error("malformed query response: {0}")]
    MalformedResponse(String),
}

impl ErrorCode for QueryError {
    fn code(&self) -> &'static str {
        match self {
            Self::RateLimited => "QUERY_RATE_LIMITED",
            Self::MissingCredentials { .. } => "QUERY_CREDENTIALS",
            Self::Http(_) => "QUERY_HTTP",
            Self::Api { .. } => "QUERY_API",
            Self::MalformedResponse(_) => "QUERY_RESPONSE",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Http(_))
    }
}

/// Completion backend seam.
pub trait QueryService: Send {
    /// Sends `prompt` to the named model and returns the completion
    /// text.
    ///
    /// # Errors
    ///
    /// [`QueryError::RateLimited`] for a transient limit the caller
    /// should retry; any other variant for a hard failure.
    fn query(&self, prompt: &str, model: &ModelSpec) -> Result<String, QueryError>;
}

/// OpenAI-compatible chat-completions client over blocking HTTP.
pub struct HttpQueryService {
    client: reqwest::blocking::Client,
    endpoint: String,
}

/// Default completions endpoint.
const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Generation can be slow; transport timeout is generous.
const QUERY_TIMEOUT: Duration = Duration::from_secs(120);

impl HttpQueryService {
    /// Creates a client against the default endpoint.
    ///
    /// # Errors
    ///
    /// [`QueryError::Http`] if the TLS backend cannot initialize.
    pub fn new() -> Result<Self, QueryError> {
        Self::with_endpoint(DEFAULT_ENDPOINT)
    }

    /// Creates a client against a custom endpoint (proxies, local
    /// inference servers).
    ///
    /// # Errors
    ///
    /// [`QueryError::Http`] if the TLS backend cannot initialize.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self, QueryError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(QUERY_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

impl QueryService for HttpQueryService {
    fn query(&self, prompt: &str, model: &ModelSpec) -> Result<String, QueryError> {
        let api_key = model
            .api_key
            .as_deref()
            .ok_or_else(|| QueryError::MissingCredentials {
                model: model.name.clone(),
            })?;

        let mut body = json!({
            "model": model.name,
            "messages": [{"role": "user", "content": prompt}],
        });
        if let Some(max_tokens) = model.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        debug!(model = %model.name, prompt_len = prompt.len(), "dispatching query");
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(QueryError::RateLimited);
        }
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(QueryError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let payload: serde_json::Value = response.json()?;
        payload
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                QueryError::MalformedResponse("missing choices[0].message.content".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_types::assert_error_codes;

    #[test]
    fn all_error_codes_valid() {
        let errs = vec![
            QueryError::RateLimited,
            QueryError::MissingCredentials {
                model: "gpt-4o-mini".into(),
            },
            QueryError::Api {
                status: 500,
                message: "boom".into(),
            },
            QueryError::MalformedResponse("empty".into()),
        ];
        assert_error_codes(&errs, "QUERY_");
    }

    #[test]
    fn rate_limit_is_recoverable_api_failure_is_not() {
        assert!(QueryError::RateLimited.is_recoverable());
        assert!(!QueryError::Api {
            status: 400,
            message: String::new()
        }
        .is_recoverable());
    }

    #[test]
    fn missing_credentials_rejected_before_transport() {
        let service = HttpQueryService::with_endpoint("http://127.0.0.1:1/unreachable")
            .expect("client builds");
        let model = ModelSpec {
            name: "gpt-4o-mini".into(),
            api_key: None,
            max_tokens: None,
        };
        let err = service.query("hello", &model).expect_err("no key");
        assert!(matches!(err, QueryError::MissingCredentials { .. }));
    }
}
