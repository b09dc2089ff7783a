//! The single streaming chat-completion request.
//!
//! [`ReviewRequest`] is built from the corpus and the run's configuration
//! and handed to a [`ChatBackend`]. The default backend, [`HttpBackend`],
//! POSTs it to `{base_url}/chat/completions` with `stream: true` and
//! decodes the event stream; tests and embedders can inject their own.
//!
//! Exactly one request is made per run. Nothing is retried: a failure to
//! start the stream is returned as a [`RequestError`], a failure after it
//! started surfaces through the fragment stream.

use crate::config::{ApiKey, ReviewConfig};
use crate::error::{LitReviewError, RequestError};
use crate::pipeline::assemble::FragmentStream;
use crate::pipeline::extract::ExtractedCorpus;
use crate::pipeline::sse;
use crate::prompts::{user_prompt, SYSTEM_PROMPT};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Longest error body echoed back in a [`RequestError`].
const MAX_ERROR_DETAIL: usize = 500;

const EVENT_STREAM: &str = "text/event-stream";

#[derive(Debug, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
}

/// Everything needed to open the completion stream.
#[derive(Clone)]
pub struct ReviewRequest {
    pub model: String,
    pub system_prompt: &'static str,
    pub user_prompt: String,
    pub endpoint: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
    credential: ApiKey,
}

impl fmt::Debug for ReviewRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReviewRequest")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("user_prompt_chars", &self.user_prompt.chars().count())
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("credential", &self.credential)
            .finish()
    }
}

impl ReviewRequest {
    /// Build the request. Fails with [`crate::ConfigError::MissingCredential`]
    /// before any I/O when no usable key is configured.
    pub fn new(corpus: &ExtractedCorpus, config: &ReviewConfig) -> Result<Self, LitReviewError> {
        let credential = config.credential()?.clone();
        Ok(Self {
            model: config.model.clone(),
            system_prompt: SYSTEM_PROMPT,
            user_prompt: user_prompt(&corpus.text),
            endpoint: config.completions_url(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            credential,
        })
    }

    pub fn credential(&self) -> &ApiKey {
        &self.credential
    }

    /// The system and user turns, in that order.
    pub fn messages(&self) -> Vec<ChatMessage<'_>> {
        vec![
            ChatMessage {
                role: "system",
                content: self.system_prompt,
            },
            ChatMessage {
                role: "user",
                content: &self.user_prompt,
            },
        ]
    }

    /// JSON body for the chat-completions endpoint.
    pub fn body(&self) -> ChatCompletionRequest<'_> {
        ChatCompletionRequest {
            model: &self.model,
            messages: self.messages(),
            stream: true,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

/// A transport that can open a streaming chat completion.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn stream_chat(&self, request: &ReviewRequest) -> Result<FragmentStream, RequestError>;
}

/// OpenAI-compatible HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
}

impl HttpBackend {
    pub fn new(connect_timeout: Duration, timeout: Duration) -> Result<Self, RequestError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| RequestError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn from_config(config: &ReviewConfig) -> Result<Self, RequestError> {
        Self::new(
            Duration::from_secs(config.connect_timeout_secs),
            Duration::from_secs(config.request_timeout_secs),
        )
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn stream_chat(&self, request: &ReviewRequest) -> Result<FragmentStream, RequestError> {
        let url =
            reqwest::Url::parse(&request.endpoint).map_err(|e| RequestError::InvalidEndpoint {
                endpoint: request.endpoint.clone(),
                reason: e.to_string(),
            })?;

        info!("Requesting review from {} (model {})", url, request.model);
        let response = self
            .client
            .post(url)
            .bearer_auth(request.credential().expose())
            .header(ACCEPT, EVENT_STREAM)
            .json(&request.body())
            .send()
            .await
            .map_err(|e| classify_send_error(&request.endpoint, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if let Some(content_type) = content_type.filter(|ct| !is_event_stream(ct)) {
            let body = response.text().await.unwrap_or_default();
            return Err(RequestError::NotAStream {
                content_type,
                detail: error_detail(&body),
            });
        }
        debug!("Stream opened (HTTP {})", status.as_u16());
        Ok(sse::fragment_stream(response.bytes_stream()))
    }
}

fn classify_send_error(endpoint: &str, e: &reqwest::Error) -> RequestError {
    if e.is_timeout() {
        RequestError::Timeout {
            endpoint: endpoint.to_string(),
        }
    } else if e.is_builder() {
        RequestError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        }
    } else {
        RequestError::Unreachable {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        }
    }
}

/// Whether a `Content-Type` value announces an event stream. Parameters
/// such as `charset` are ignored.
fn is_event_stream(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|media| media.trim().eq_ignore_ascii_case(EVENT_STREAM))
}

/// Map a non-success HTTP status to a [`RequestError`].
pub fn status_error(status: StatusCode, body: &str) -> RequestError {
    let detail = error_detail(body);
    match status.as_u16() {
        401 | 403 => RequestError::Unauthorized {
            status: status.as_u16(),
            detail,
        },
        400 | 404 | 422 => RequestError::Rejected {
            status: status.as_u16(),
            detail,
        },
        429 => RequestError::RateLimited { detail },
        code => RequestError::Status {
            status: code,
            detail,
        },
    }
}

/// Prefer `error.message` from an OpenAI-style error body; fall back to
/// the raw body, shortened.
fn error_detail(body: &str) -> String {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string());
    match message.char_indices().nth(MAX_ERROR_DETAIL) {
        Some((idx, _)) => format!("{}…", &message[..idx]),
        None => message,
    }
}

/// Build the request for `corpus` and open the completion stream.
///
/// Uses the injected [`ReviewConfig::backend`] when present, otherwise a
/// fresh [`HttpBackend`].
pub async fn build_and_send(
    corpus: &ExtractedCorpus,
    config: &ReviewConfig,
) -> Result<FragmentStream, LitReviewError> {
    let request = ReviewRequest::new(corpus, config)?;
    let backend: Arc<dyn ChatBackend> = match config.backend {
        Some(ref backend) => Arc::clone(backend),
        None => Arc::new(HttpBackend::from_config(config)?),
    };
    Ok(backend.stream_chat(&request).await?)
}
