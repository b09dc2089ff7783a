//! Progress-callback trait for extraction and generation events.
//!
//! Inject an [`Arc<dyn ReviewProgressCallback>`] via
//! [`crate::config::ReviewConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through the uploaded papers and then waits
//! on the model. The review text itself is not delivered here; consume the
//! snapshot stream from [`crate::review::generate_review_stream`] for that.
//!
//! # Example
//!
//! ```rust
//! use pdf_litreview::{ReviewProgressCallback, ReviewConfig};
//! use std::sync::{Arc, Mutex};
//!
//! struct Fractions(Mutex<Vec<f32>>);
//!
//! impl ReviewProgressCallback for Fractions {
//!     fn on_progress(&self, fraction: f32) {
//!         self.0.lock().unwrap().push(fraction);
//!     }
//! }
//!
//! let config = ReviewConfig::builder()
//!     .progress_callback(Arc::new(Fractions(Mutex::new(Vec::new()))))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it processes documents and streams the review.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Documents are processed sequentially, so events
/// arrive in order, but the trait is `Send + Sync` because extraction runs
/// on the blocking thread pool.
pub trait ReviewProgressCallback: Send + Sync {
    /// Called once before the first document is opened.
    fn on_extraction_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called just before a document is handed to the PDF engine.
    ///
    /// `index` is 1-based.
    fn on_document_start(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// Called when a document's text was extracted.
    ///
    /// * `chars`     — characters embedded in the corpus (after the budget)
    /// * `truncated` — whether the budget cut the document short
    fn on_document_complete(
        &self,
        index: usize,
        total: usize,
        name: &str,
        chars: usize,
        truncated: bool,
    ) {
        let _ = (index, total, name, chars, truncated);
    }

    /// Called when a document could not be extracted. The batch continues.
    fn on_document_error(&self, index: usize, total: usize, name: &str, error: &str) {
        let _ = (index, total, name, error);
    }

    /// Called after every document, success or failure, with
    /// `processed / total` in `0.0..=1.0`.
    fn on_progress(&self, fraction: f32) {
        let _ = fraction;
    }

    /// Called once after all documents have been attempted.
    fn on_extraction_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }

    /// Called just before the completion request is sent.
    fn on_generation_start(&self, model: &str, corpus_chars: usize) {
        let _ = (model, corpus_chars);
    }

    /// Called when the stream ends, cleanly or not.
    fn on_generation_complete(&self, review_chars: usize, complete: bool) {
        let _ = (review_chars, complete);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ReviewProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ReviewConfig`].
pub type ProgressCallback = Arc<dyn ReviewProgressCallback>;

/// `processed / total`, with an empty batch counting as finished.
pub fn progress_fraction(processed: usize, total: usize) -> f32 {
    if total == 0 {
        1.0
    } else {
        (processed.min(total) as f32) / (total as f32)
    }
}
