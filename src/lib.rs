//! # pdf-litreview
//!
//! Generate a structured literature review from a batch of research papers
//! with a streaming chat-completion model.
//!
//! ## Why this crate?
//!
//! Reading twenty papers to write the background chapter of a thesis is
//! slow. This crate pulls the text layer out of each PDF, caps every paper
//! at a fixed character budget so one long survey cannot crowd out the
//! rest, and asks an OpenAI-compatible model for a review with a fixed
//! five-part structure and author-year citations. The review streams back
//! and is exposed as a growing document, so a terminal or UI can show it
//! while it is being written.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDFs
//!  │
//!  ├─ 1. Input     read files, check the %PDF signature
//!  ├─ 2. Extract   page text via pdfium (spawn_blocking), cleanup, budget
//!  ├─ 3. Request   one streaming POST to {base_url}/chat/completions
//!  ├─ 4. Decode    text/event-stream → fragments
//!  └─ 5. Assemble  fragments → cumulative snapshots → Markdown
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_litreview::{generate_review, read_documents, ReviewConfig};
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let paths = vec![PathBuf::from("nurbs.pdf"), PathBuf::from("s-curve.pdf")];
//!     let (documents, unreadable) = read_documents(&paths).await;
//!     for e in &unreadable {
//!         eprintln!("skipped: {e}");
//!     }
//!     let config = ReviewConfig::builder()
//!         .api_key(std::env::var("OPENAI_API_KEY")?)
//!         .build()?;
//!     let output = generate_review(&documents, &config).await?.into_result()?;
//!     println!("{}", output.markdown);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `litreview` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf-litreview = { version = "0.1", default-features = false }
//! ```
//!
//! ## PDF engine
//!
//! Text extraction binds to the pdfium shared library at runtime, from
//! `PDFIUM_LIB_PATH` when set and otherwise from the system loader path.
//! Inject a [`PageTextSource`] through the config to use something else.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod review;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ApiKey, ReviewConfig, ReviewConfigBuilder};
pub use error::{ConfigError, ExtractionError, LitReviewError, RequestError, StreamError};
pub use output::{ReviewOutput, ReviewStats};
pub use pipeline::assemble::{
    assemble, Fragment, FragmentStream, Interrupted, Snapshot, SnapshotStream, StreamAssembler,
};
pub use pipeline::extract::{
    extract, DocumentOutcome, DocumentSummary, ExtractedCorpus, ExtractionReport, PageTextError,
    PageTextSource, PdfiumTextSource,
};
pub use pipeline::input::{read_document, read_documents, UploadedDocument};
pub use pipeline::request::{build_and_send, ChatBackend, HttpBackend, ReviewRequest};
pub use progress::{NoopProgressCallback, ProgressCallback, ReviewProgressCallback};
pub use review::{
    extract_only, generate_review, generate_review_stream, generate_review_sync,
    generate_review_to_file, write_review, ReviewSession,
};
