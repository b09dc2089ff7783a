//! Configuration types for literature-review generation.
//!
//! Everything a run needs (credential, endpoint, model, per-paper budget,
//! timeouts) lives in one immutable [`ReviewConfig`] that is passed into the
//! pipeline at call time. There is no process-wide session state; two runs
//! with different keys or endpoints can coexist in the same process.

use crate::error::ConfigError;
use crate::pipeline::extract::PageTextSource;
use crate::pipeline::request::ChatBackend;
use crate::progress::ReviewProgressCallback;
use std::fmt;
use std::sync::Arc;

/// Default OpenAI-compatible API base.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default chat model; a long-context model is needed for multi-paper corpora.
pub const DEFAULT_MODEL: &str = "gpt-4-turbo";

/// Default per-document character budget.
pub const DEFAULT_CHAR_BUDGET: usize = 8000;

/// Default file name for the downloadable review.
pub const DEFAULT_OUTPUT_FILE: &str = "Literature_Review_Interpolation.md";

/// An API credential. `Debug` and `Display` never print the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw secret, for building the `Authorization` header only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Blank or whitespace-only keys count as missing.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// Configuration for one literature-review generation.
///
/// Built via [`ReviewConfig::builder()`] or [`ReviewConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf_litreview::ReviewConfig;
///
/// let config = ReviewConfig::builder()
///     .api_key("sk-test")
///     .base_url("https://api.deepseek.com/v1")
///     .model("deepseek-chat")
///     .char_budget(12_000)
///     .build()
///     .unwrap();
/// assert_eq!(config.model, "deepseek-chat");
/// ```
#[derive(Clone)]
pub struct ReviewConfig {
    /// Bearer credential for the completion endpoint. Checked before any
    /// network call; `None` or blank fails with [`ConfigError::MissingCredential`].
    pub api_key: Option<ApiKey>,

    /// API base URL; `/chat/completions` is appended. Default: [`DEFAULT_BASE_URL`].
    pub base_url: String,

    /// Chat model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Maximum characters of extracted text embedded per document. Default: 8000.
    ///
    /// The budget is per document and does not scale with the number of
    /// papers or the model's context window; raise it for long-context
    /// models, lower it when many papers are uploaded at once.
    pub char_budget: usize,

    /// Sampling temperature. `None` leaves the service default in place.
    pub temperature: Option<f32>,

    /// Upper bound on generated tokens. `None` leaves the service default.
    pub max_tokens: Option<usize>,

    /// TCP/TLS connect timeout in seconds. Default: 30.
    pub connect_timeout_secs: u64,

    /// Overall request timeout in seconds, covering the whole streamed
    /// response. Default: 600.
    pub request_timeout_secs: u64,

    /// Pre-constructed transport. Takes precedence over the built-in HTTP backend.
    pub backend: Option<Arc<dyn ChatBackend>>,

    /// Pre-constructed PDF text source. Takes precedence over pdfium.
    pub text_source: Option<Arc<dyn PageTextSource>>,

    /// Optional extraction/generation progress callback.
    pub progress_callback: Option<Arc<dyn ReviewProgressCallback>>,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            char_budget: DEFAULT_CHAR_BUDGET,
            temperature: None,
            max_tokens: None,
            connect_timeout_secs: 30,
            request_timeout_secs: 600,
            backend: None,
            text_source: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ReviewConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReviewConfig")
            .field("api_key", &self.api_key)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("char_budget", &self.char_budget)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("backend", &self.backend.as_ref().map(|_| "<dyn ChatBackend>"))
            .field(
                "text_source",
                &self.text_source.as_ref().map(|_| "<dyn PageTextSource>"),
            )
            .finish()
    }
}

impl ReviewConfig {
    /// Create a new builder for `ReviewConfig`.
    pub fn builder() -> ReviewConfigBuilder {
        ReviewConfigBuilder {
            config: Self::default(),
        }
    }

    /// The credential, or [`ConfigError::MissingCredential`] when absent or blank.
    pub fn credential(&self) -> Result<&ApiKey, ConfigError> {
        match self.api_key {
            Some(ref key) if !key.is_blank() => Ok(key),
            _ => Err(ConfigError::MissingCredential),
        }
    }

    /// Full chat-completions URL derived from `base_url`.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// Builder for [`ReviewConfig`].
pub struct ReviewConfigBuilder {
    config: ReviewConfig,
}

impl fmt::Debug for ReviewConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReviewConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ReviewConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(ApiKey::new(key));
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn char_budget(mut self, chars: usize) -> Self {
        self.config.char_budget = chars;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = Some(n);
        self
    }

    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config.connect_timeout_secs = secs;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn backend(mut self, backend: Arc<dyn ChatBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn text_source(mut self, source: Arc<dyn PageTextSource>) -> Self {
        self.config.text_source = Some(source);
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn ReviewProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// The credential is deliberately not required here: `--extract-only`
    /// runs without one, and a missing key is reported at generation time.
    pub fn build(self) -> Result<ReviewConfig, ConfigError> {
        let c = &self.config;
        if c.char_budget == 0 {
            return Err(ConfigError::Invalid(
                "Per-document character budget must be ≥ 1".into(),
            ));
        }
        if c.model.trim().is_empty() {
            return Err(ConfigError::Invalid("Model name must not be empty".into()));
        }
        let base = c.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "Base URL must start with http:// or https://, got '{}'",
                c.base_url
            )));
        }
        if let Err(e) = reqwest::Url::parse(base) {
            return Err(ConfigError::Invalid(format!(
                "Base URL '{}' is not a valid URL: {}",
                c.base_url, e
            )));
        }
        if c.request_timeout_secs == 0 || c.connect_timeout_secs == 0 {
            return Err(ConfigError::Invalid("Timeouts must be ≥ 1 second".into()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_behaviour() {
        let c = ReviewConfig::default();
        assert_eq!(c.base_url, "https://api.openai.com/v1");
        assert_eq!(c.model, "gpt-4-turbo");
        assert_eq!(c.char_budget, 8000);
        assert!(c.api_key.is_none());
    }

    #[test]
    fn debug_redacts_credential() {
        let c = ReviewConfig::builder()
            .api_key("sk-very-secret")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("sk-very-secret"), "got: {dbg}");
        assert!(dbg.contains("<redacted>"));
        assert_eq!(format!("{}", c.api_key.unwrap()), "<redacted>");
    }

    #[test]
    fn blank_credential_counts_as_missing() {
        let c = ReviewConfig::builder().api_key("   ").build().unwrap();
        assert_eq!(c.credential(), Err(ConfigError::MissingCredential));
        let c = ReviewConfig::default();
        assert_eq!(c.credential(), Err(ConfigError::MissingCredential));
    }

    #[test]
    fn completions_url_tolerates_trailing_slash() {
        let c = ReviewConfig::builder()
            .base_url("https://api.deepseek.com/v1/")
            .build()
            .unwrap();
        assert_eq!(
            c.completions_url(),
            "https://api.deepseek.com/v1/chat/completions"
        );
    }

    #[test]
    fn build_rejects_zero_budget() {
        let err = ReviewConfig::builder().char_budget(0).build().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn build_rejects_non_http_base_url() {
        let err = ReviewConfig::builder()
            .base_url("ftp://example.org")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("http"));
    }

    #[test]
    fn temperature_is_clamped() {
        let c = ReviewConfig::builder().temperature(5.0).build().unwrap();
        assert_eq!(c.temperature, Some(2.0));
    }
}
