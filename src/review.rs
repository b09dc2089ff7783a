//! Top-level review API.
//!
//! Two shapes are offered over the same pipeline:
//!
//! * [`generate_review_stream`] hands back the extraction report and a
//!   live [`SnapshotStream`], for callers that render the review while it
//!   is being written.
//! * [`generate_review`] drains the same fragments into a single
//!   [`ReviewOutput`] without taking intermediate snapshots.
//!
//! Both validate their input before doing any work: no documents or no
//! credential fail with a [`ConfigError`] before a file is opened or a
//! socket is connected.

use crate::config::ReviewConfig;
use crate::error::{ConfigError, LitReviewError};
use crate::output::{ReviewOutput, ReviewStats};
use crate::pipeline::assemble::{
    assemble, FragmentStream, Snapshot, SnapshotStream, StreamAssembler,
};
use crate::pipeline::extract::{extract, ExtractionReport};
use crate::pipeline::input::UploadedDocument;
use crate::pipeline::request::build_and_send;
use futures::StreamExt;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A review being generated: what was extracted, and the live snapshots.
pub struct ReviewSession {
    pub report: ExtractionReport,
    pub snapshots: SnapshotStream,
}

/// Extract the documents, send the request and return the snapshot stream.
///
/// # Errors
/// * [`ConfigError::NoDocuments`] / [`ConfigError::MissingCredential`]
///   before any I/O.
/// * [`LitReviewError::NothingExtracted`] when every document failed;
///   no request is sent.
/// * [`LitReviewError::Request`] when the stream could not be opened.
pub async fn generate_review_stream(
    documents: &[UploadedDocument],
    config: &ReviewConfig,
) -> Result<ReviewSession, LitReviewError> {
    let (report, fragments) = open_stream(documents, config).await?;
    Ok(ReviewSession {
        report,
        snapshots: assemble(fragments),
    })
}

async fn open_stream(
    documents: &[UploadedDocument],
    config: &ReviewConfig,
) -> Result<(ExtractionReport, FragmentStream), LitReviewError> {
    validate(documents, config)?;

    let report = extract(documents, config).await?;
    if report.corpus.is_empty() {
        let first_error = report
            .failures()
            .next()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no text extracted".to_string());
        return Err(LitReviewError::NothingExtracted {
            failed: report.failure_count(),
            first_error,
        });
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_generation_start(&config.model, report.corpus.chars());
    }
    let fragments = build_and_send(&report.corpus, config).await?;
    Ok((report, fragments))
}

/// Generate the complete review.
///
/// A stream that breaks mid-way is not an error here: the output carries
/// the partial text with `complete == false`. Call
/// [`ReviewOutput::into_result`] to treat that as a failure.
pub async fn generate_review(
    documents: &[UploadedDocument],
    config: &ReviewConfig,
) -> Result<ReviewOutput, LitReviewError> {
    let start = Instant::now();
    let (report, mut stream) = open_stream(documents, config).await?;

    let gen_start = Instant::now();
    let mut assembler = StreamAssembler::new();
    let mut interruption = None;
    while let Some(item) = stream.next().await {
        match item {
            Ok(fragment) => {
                if assembler.push(fragment) {
                    debug!(
                        "Fragment {}: {} chars so far",
                        assembler.fragments(),
                        assembler.text().len()
                    );
                }
            }
            Err(error) => {
                warn!(
                    "Review generation interrupted after {} characters: {}",
                    assembler.text().chars().count(),
                    error
                );
                interruption = Some(error);
                break;
            }
        }
    }

    let complete = interruption.is_none();
    let Snapshot {
        text: markdown,
        fragments,
        finish_reason,
        ..
    } = assembler.finish();

    let review_chars = markdown.chars().count();
    if let Some(ref cb) = config.progress_callback {
        cb.on_generation_complete(review_chars, complete);
    }

    let stats = ReviewStats {
        documents_total: documents.len(),
        documents_extracted: report.success_count(),
        documents_failed: report.failure_count(),
        corpus_chars: report.corpus.chars(),
        review_chars,
        fragments,
        finish_reason,
        extraction_ms: report.duration_ms,
        generation_ms: gen_start.elapsed().as_millis() as u64,
        total_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        "Review {}: {} chars from {} document(s) in {}ms",
        if complete { "complete" } else { "interrupted" },
        stats.review_chars,
        stats.documents_extracted,
        stats.total_ms
    );

    Ok(ReviewOutput {
        markdown,
        complete,
        interruption,
        extraction: report,
        stats,
    })
}

/// Generate the review and write it to `output_path`.
///
/// Only a complete review is written. An interrupted one is returned as
/// [`LitReviewError::Stream`] with the partial text attached.
pub async fn generate_review_to_file(
    documents: &[UploadedDocument],
    output_path: impl AsRef<Path>,
    config: &ReviewConfig,
) -> Result<ReviewStats, LitReviewError> {
    let output = generate_review(documents, config).await?.into_result()?;
    write_review(output_path, &output.markdown).await?;
    Ok(output.stats)
}

/// Synchronous wrapper around [`generate_review`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_review_sync(
    documents: &[UploadedDocument],
    config: &ReviewConfig,
) -> Result<ReviewOutput, LitReviewError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| LitReviewError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate_review(documents, config))
}

/// Extract the documents without contacting the model.
///
/// Needs no credential. An empty input yields an empty report.
pub async fn extract_only(
    documents: &[UploadedDocument],
    config: &ReviewConfig,
) -> Result<ExtractionReport, LitReviewError> {
    extract(documents, config).await
}

/// Write Markdown to `path` atomically (temp file + rename), creating
/// parent directories as needed.
pub async fn write_review(path: impl AsRef<Path>, markdown: &str) -> Result<(), LitReviewError> {
    let path = path.as_ref();
    let write_err = |e| LitReviewError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, markdown)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(write_err)?;
    Ok(())
}

fn validate(documents: &[UploadedDocument], config: &ReviewConfig) -> Result<(), ConfigError> {
    if documents.is_empty() {
        return Err(ConfigError::NoDocuments);
    }
    config.credential()?;
    Ok(())
}
