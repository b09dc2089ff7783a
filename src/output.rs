//! Result types returned by the top-level review functions.

use crate::error::{LitReviewError, StreamError};
use crate::pipeline::extract::ExtractionReport;
use serde::{Deserialize, Serialize};

/// The outcome of one review run.
///
/// A mid-stream failure does not discard the text received so far: the
/// partial review is in `markdown`, `complete` is false and `interruption`
/// says why. Use [`ReviewOutput::into_result`] to turn that case into an
/// error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewOutput {
    /// The assembled review, exactly as streamed.
    pub markdown: String,
    /// True when the stream ended cleanly.
    pub complete: bool,
    pub interruption: Option<StreamError>,
    pub extraction: ExtractionReport,
    pub stats: ReviewStats,
}

impl ReviewOutput {
    /// `Err(LitReviewError::Stream)` carrying the partial text when the
    /// stream was interrupted, otherwise `Ok(self)`.
    pub fn into_result(self) -> Result<Self, LitReviewError> {
        match self.interruption {
            Some(source) => Err(LitReviewError::Stream {
                partial: self.markdown,
                source,
            }),
            None => Ok(self),
        }
    }
}

/// Counters and timings for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewStats {
    pub documents_total: usize,
    pub documents_extracted: usize,
    pub documents_failed: usize,
    /// Characters in the corpus sent to the model.
    pub corpus_chars: usize,
    /// Characters in the generated review.
    pub review_chars: usize,
    /// Text-bearing fragments received.
    pub fragments: usize,
    pub finish_reason: Option<String>,
    pub extraction_ms: u64,
    pub generation_ms: u64,
    pub total_ms: u64,
}
