//! Error types for the pdf-litreview library.
//!
//! The failure modes of a review run do not share a single severity, so
//! each gets its own type:
//!
//! * [`ExtractionError`] — **Non-fatal**, one per bad document (corrupt
//!   file, password-protected PDF, unreadable path). Collected into
//!   [`crate::pipeline::extract::ExtractionReport`]; the batch continues.
//!
//! * [`ConfigError`] — the run was asked for with missing or invalid input
//!   (no credential, no documents). Always raised before any network call.
//!
//! * [`RequestError`] — the single chat-completion request could not be
//!   started (endpoint unreachable, credential rejected, bad model name).
//!   Fatal to the attempt; never retried.
//!
//! * [`StreamError`] — the response stream broke after it had started.
//!   Whatever was assembled up to that point is kept and handed back
//!   alongside the error.
//!
//! [`LitReviewError`] is the fatal umbrella returned by the top-level
//! `generate_review*` functions.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf-litreview library.
///
/// Per-document extraction failures use [`ExtractionError`] and are stored
/// in the extraction report rather than propagated here.
#[derive(Debug, Error)]
pub enum LitReviewError {
    // ── Taxonomy ──────────────────────────────────────────────────────────
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Request(#[from] RequestError),

    /// The response stream broke mid-way. `partial` holds the review text
    /// assembled before the failure.
    #[error("Review generation was interrupted after {} characters: {source}", .partial.chars().count())]
    Stream {
        partial: String,
        #[source]
        source: StreamError,
    },

    // ── Extraction ────────────────────────────────────────────────────────
    /// Every document failed extraction; there is nothing to send.
    #[error("None of the {failed} documents could be extracted.\nFirst error: {first_error}")]
    NothingExtracted { failed: usize, first_error: String },

    /// The PDF engine itself could not be loaded. Unlike a single bad
    /// file this affects every document, so the batch aborts.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium to point at an existing copy,\n\
or install pdfium somewhere the system loader can find it.\n"
    )]
    PdfEngine(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LitReviewError {
    /// True when the failure happened before any network I/O because the
    /// caller's input was incomplete.
    pub fn is_configuration(&self) -> bool {
        matches!(self, LitReviewError::Config(_))
    }

    /// Text assembled before a mid-stream failure, if any.
    pub fn partial_review(&self) -> Option<&str> {
        match self {
            LitReviewError::Stream { partial, .. } => Some(partial),
            _ => None,
        }
    }
}

/// Input problems detected before any I/O is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("No API key supplied.\nProvide one with --api-key or OPENAI_API_KEY.")]
    MissingCredential,

    #[error("No documents selected. Pass at least one PDF file.")]
    NoDocuments,

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// A non-fatal error for a single uploaded document.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ExtractionError {
    /// The file could not be read from disk.
    #[error("{name}: could not be read: {detail}")]
    Unreadable { name: String, detail: String },

    /// The bytes do not start with the `%PDF` signature.
    #[error("{name}: not a PDF file (first bytes: {magic:?})")]
    NotAPdf { name: String, magic: Vec<u8> },

    /// The PDF requires a password.
    #[error("{name}: PDF is encrypted and requires a password")]
    Encrypted { name: String },

    /// pdfium could not parse the document.
    #[error("{name}: PDF is corrupt or unsupported: {detail}")]
    Corrupt { name: String, detail: String },
}

impl ExtractionError {
    /// The name of the document this diagnostic refers to.
    pub fn document(&self) -> &str {
        match self {
            ExtractionError::Unreadable { name, .. }
            | ExtractionError::NotAPdf { name, .. }
            | ExtractionError::Encrypted { name }
            | ExtractionError::Corrupt { name, .. } => name,
        }
    }
}

/// Failures that prevent the completion request from producing a stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("Could not reach '{endpoint}': {reason}\nCheck the base URL and your internet connection.")]
    Unreachable { endpoint: String, reason: String },

    #[error("Request to '{endpoint}' timed out")]
    Timeout { endpoint: String },

    /// HTTP 401/403 — the credential was refused.
    #[error("The endpoint rejected the API key (HTTP {status}): {detail}")]
    Unauthorized { status: u16, detail: String },

    /// HTTP 400/404/422 — typically an unknown model or bad parameters.
    #[error("The endpoint rejected the request (HTTP {status}): {detail}")]
    Rejected { status: u16, detail: String },

    /// HTTP 429. Reported as-is; no retry is attempted.
    #[error("Rate limit exceeded (HTTP 429): {detail}")]
    RateLimited { detail: String },

    #[error("Completion API error (HTTP {status}): {detail}")]
    Status { status: u16, detail: String },

    /// A success status whose body is not an event stream, e.g. a gateway
    /// answering with a JSON error despite `stream: true`.
    #[error("Expected an event stream but got '{content_type}': {detail}")]
    NotAStream { content_type: String, detail: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// Failures after the response stream has started.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum StreamError {
    /// The connection dropped while reading the body.
    #[error("connection interrupted: {0}")]
    Interrupted(String),

    /// A `data:` event could not be decoded.
    #[error("malformed stream event: {detail}")]
    MalformedFragment { detail: String },

    /// The service sent an error object inside the stream.
    #[error("service reported an error mid-stream: {0}")]
    Remote(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_error_names_document() {
        let e = ExtractionError::Corrupt {
            name: "broken.pdf".into(),
            detail: "xref missing".into(),
        };
        assert_eq!(e.document(), "broken.pdf");
        assert!(e.to_string().contains("broken.pdf"));
    }

    #[test]
    fn stream_error_keeps_partial() {
        let e = LitReviewError::Stream {
            partial: "# Backgr".into(),
            source: StreamError::Interrupted("reset by peer".into()),
        };
        assert_eq!(e.partial_review(), Some("# Backgr"));
        assert!(e.to_string().contains("8 characters"), "got: {e}");
    }

    #[test]
    fn config_errors_are_classified() {
        let e: LitReviewError = ConfigError::MissingCredential.into();
        assert!(e.is_configuration());
        let e: LitReviewError = RequestError::RateLimited {
            detail: "slow down".into(),
        }
        .into();
        assert!(!e.is_configuration());
    }

    #[test]
    fn unauthorized_display() {
        let e = RequestError::Unauthorized {
            status: 401,
            detail: "invalid_api_key".into(),
        };
        assert!(e.to_string().contains("401"));
        assert!(e.to_string().contains("invalid_api_key"));
    }
}
