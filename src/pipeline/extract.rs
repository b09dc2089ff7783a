//! Text extraction: turn uploaded PDFs into one delimited corpus.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a synchronous C++ library; opening a document and walking its
//! text layer blocks the calling thread. Every document is therefore handed
//! to `tokio::task::spawn_blocking` so the async runtime stays responsive
//! while the progress bar updates.
//!
//! ## Corpus layout
//!
//! Each successfully extracted document contributes exactly one section:
//!
//! ```text
//! \n--- Start of Paper: <name> ---\n<text, at most char_budget chars>\n--- End of Paper ---\n
//! ```
//!
//! Sections appear in upload order. Failed documents contribute nothing
//! and are reported in [`ExtractionReport::documents`] instead.

use crate::config::ReviewConfig;
use crate::error::{ExtractionError, LitReviewError};
use crate::pipeline::input::UploadedDocument;
use crate::pipeline::sanitize::clean_extracted_text;
use crate::progress::progress_fraction;
use pdfium_render::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Env var naming an explicit pdfium shared library to bind to.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

// ── Page text sources ────────────────────────────────────────────────────────

/// Why a [`PageTextSource`] could not produce page text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageTextError {
    #[error("document is encrypted")]
    Encrypted,

    #[error("{0}")]
    Corrupt(String),

    /// The engine itself is unavailable; every document would fail the same way.
    #[error("{0}")]
    Engine(String),
}

/// Produces the text layer of a PDF, one entry per page.
///
/// A page whose text cannot be read yields `None`, which is treated as an
/// empty page. Implementations are called from the blocking thread pool.
pub trait PageTextSource: Send + Sync {
    fn page_texts(&self, bytes: &[u8]) -> Result<Vec<Option<String>>, PageTextError>;
}

/// Default text source backed by the pdfium shared library.
#[derive(Debug, Clone, Default)]
pub struct PdfiumTextSource {
    library_path: Option<PathBuf>,
}

impl PdfiumTextSource {
    /// Bind to `$PDFIUM_LIB_PATH` when set, otherwise to the system library.
    pub fn from_env() -> Self {
        Self {
            library_path: std::env::var_os(PDFIUM_LIB_PATH_ENV).map(PathBuf::from),
        }
    }

    /// Bind to a specific pdfium shared library.
    pub fn with_library(path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: Some(path.into()),
        }
    }

    fn bind(&self) -> Result<Pdfium, PageTextError> {
        match self.library_path {
            Some(ref path) => Pdfium::bind_to_library(path),
            None => Pdfium::bind_to_system_library(),
        }
        .map(Pdfium::new)
        .map_err(|e| PageTextError::Engine(e.to_string()))
    }
}

impl PageTextSource for PdfiumTextSource {
    fn page_texts(&self, bytes: &[u8]) -> Result<Vec<Option<String>>, PageTextError> {
        let pdfium = self.bind()?;
        let document = pdfium.load_pdf_from_byte_slice(bytes, None).map_err(|e| {
            let err_str = format!("{:?}", e);
            if err_str.contains("Password") || err_str.contains("password") {
                PageTextError::Encrypted
            } else {
                PageTextError::Corrupt(err_str)
            }
        })?;

        let texts = document
            .pages()
            .iter()
            .map(|page| page.text().ok().map(|text| text.all()))
            .collect();
        Ok(texts)
    }
}

// ── Corpus ───────────────────────────────────────────────────────────────────

/// The concatenated, delimited text of all successfully extracted documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedCorpus {
    pub text: String,
    /// Number of documents embedded.
    pub sections: usize,
}

impl ExtractedCorpus {
    pub fn is_empty(&self) -> bool {
        self.sections == 0
    }

    /// Length of the corpus in characters.
    pub fn chars(&self) -> usize {
        self.text.chars().count()
    }

    /// Append one document, cutting its text at `budget` characters.
    ///
    /// Returns `(embedded_chars, truncated)`.
    pub fn push_section(&mut self, name: &str, text: &str, budget: usize) -> (usize, bool) {
        let (kept, truncated) = truncate_chars(text, budget);
        self.text.push_str(&section_header(name));
        self.text.push_str(kept);
        self.text.push_str(SECTION_FOOTER);
        self.sections += 1;
        (kept.chars().count(), truncated)
    }
}

const SECTION_FOOTER: &str = "\n--- End of Paper ---\n";

fn section_header(name: &str) -> String {
    format!("\n--- Start of Paper: {} ---\n", name)
}

/// The longest prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (&text[..byte_idx], true),
        None => (text, false),
    }
}

// ── Report ───────────────────────────────────────────────────────────────────

/// What was embedded for one successfully extracted document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub name: String,
    pub pages: usize,
    /// Characters after cleanup, before the budget was applied.
    pub source_chars: usize,
    /// Characters actually embedded in the corpus.
    pub embedded_chars: usize,
    pub truncated: bool,
}

/// Per-document result: what was embedded, or why the file was skipped.
pub type DocumentOutcome = Result<DocumentSummary, ExtractionError>;

/// Outcome of extracting a batch of documents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub corpus: ExtractedCorpus,
    /// One entry per uploaded document, in upload order.
    pub documents: Vec<DocumentOutcome>,
    pub duration_ms: u64,
}

impl ExtractionReport {
    /// Names of the documents embedded in the corpus, in order.
    pub fn extracted_names(&self) -> Vec<&str> {
        self.documents
            .iter()
            .filter_map(|d| d.as_ref().ok())
            .map(|d| d.name.as_str())
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ExtractionError> {
        self.documents.iter().filter_map(|d| d.as_ref().err())
    }

    pub fn success_count(&self) -> usize {
        self.documents.iter().filter(|d| d.is_ok()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.documents.len() - self.success_count()
    }

    /// The corpus and the ordered list of embedded file names.
    pub fn into_parts(self) -> (ExtractedCorpus, Vec<String>) {
        let names = self
            .documents
            .into_iter()
            .filter_map(Result::ok)
            .map(|d| d.name)
            .collect();
        (self.corpus, names)
    }
}

// ── Extraction ───────────────────────────────────────────────────────────────

/// Extract every document in order and build the corpus.
///
/// A document that fails to open or parse is recorded as an
/// [`ExtractionError`] and skipped. Only an unavailable PDF engine aborts
/// the batch. An empty input yields an empty report.
pub async fn extract(
    documents: &[UploadedDocument],
    config: &ReviewConfig,
) -> Result<ExtractionReport, LitReviewError> {
    let start = Instant::now();
    let source: Arc<dyn PageTextSource> = match config.text_source {
        Some(ref source) => Arc::clone(source),
        None => Arc::new(PdfiumTextSource::from_env()),
    };
    let cb = config.progress_callback.as_ref();
    let total = documents.len();

    info!("Extracting text from {} document(s)", total);
    if let Some(cb) = cb {
        cb.on_extraction_start(total);
    }

    let mut report = ExtractionReport::default();
    for (i, doc) in documents.iter().enumerate() {
        let index = i + 1;
        if let Some(cb) = cb {
            cb.on_document_start(index, total, doc.name());
        }

        match extract_document(&source, doc).await? {
            Ok((pages, text)) => {
                let source_chars = text.chars().count();
                let (embedded_chars, truncated) =
                    report.corpus.push_section(doc.name(), &text, config.char_budget);
                debug!(
                    "{}: {} page(s), {} chars, embedded {}{}",
                    doc.name(),
                    pages,
                    source_chars,
                    embedded_chars,
                    if truncated { " (truncated)" } else { "" }
                );
                if let Some(cb) = cb {
                    cb.on_document_complete(index, total, doc.name(), embedded_chars, truncated);
                }
                report.documents.push(Ok(DocumentSummary {
                    name: doc.name().to_string(),
                    pages,
                    source_chars,
                    embedded_chars,
                    truncated,
                }));
            }
            Err(e) => {
                warn!("Skipping {}", e);
                if let Some(cb) = cb {
                    cb.on_document_error(index, total, doc.name(), &e.to_string());
                }
                report.documents.push(Err(e));
            }
        }

        if let Some(cb) = cb {
            cb.on_progress(progress_fraction(index, total));
        }
    }

    report.duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Extraction done: {}/{} document(s), {} corpus chars in {}ms",
        report.success_count(),
        total,
        report.corpus.chars(),
        report.duration_ms
    );
    if let Some(cb) = cb {
        cb.on_extraction_complete(total, report.success_count());
    }
    Ok(report)
}

/// Extract one document. The outer error aborts the batch; the inner one
/// is a per-document diagnostic.
async fn extract_document(
    source: &Arc<dyn PageTextSource>,
    doc: &UploadedDocument,
) -> Result<Result<(usize, String), ExtractionError>, LitReviewError> {
    let name = doc.name().to_string();
    if !doc.looks_like_pdf() {
        return Ok(Err(ExtractionError::NotAPdf {
            name,
            magic: doc.magic(),
        }));
    }

    let source = Arc::clone(source);
    let bytes = doc.shared_bytes();
    let pages = match tokio::task::spawn_blocking(move || source.page_texts(&bytes)).await {
        Ok(pages) => pages,
        Err(e) => {
            return Ok(Err(ExtractionError::Corrupt {
                name,
                detail: format!("extraction task panicked: {}", e),
            }))
        }
    };

    match pages {
        Ok(pages) => Ok(Ok((pages.len(), clean_extracted_text(&join_pages(&pages))))),
        Err(PageTextError::Engine(detail)) => Err(LitReviewError::PdfEngine(detail)),
        Err(PageTextError::Encrypted) => Ok(Err(ExtractionError::Encrypted { name })),
        Err(PageTextError::Corrupt(detail)) => Ok(Err(ExtractionError::Corrupt { name, detail })),
    }
}

/// Pages are joined with a newline so words at page boundaries stay apart.
fn join_pages(pages: &[Option<String>]) -> String {
    pages
        .iter()
        .map(|p| p.as_deref().unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_pdfium_library_is_an_engine_error() {
        let source = PdfiumTextSource::with_library("/nonexistent/libpdfium.so");
        let err = source.page_texts(b"%PDF-1.4\n").unwrap_err();
        assert!(matches!(err, PageTextError::Engine(_)));
    }

    struct FixedPages(Vec<Option<String>>);

    impl PageTextSource for FixedPages {
        fn page_texts(&self, _: &[u8]) -> Result<Vec<Option<String>>, PageTextError> {
            Ok(self.0.clone())
        }
    }

    struct Failing(PageTextError);

    impl PageTextSource for Failing {
        fn page_texts(&self, _: &[u8]) -> Result<Vec<Option<String>>, PageTextError> {
            Err(self.0.clone())
        }
    }

    fn pdf(name: &str) -> UploadedDocument {
        UploadedDocument::new(name, b"%PDF-1.4 test".to_vec())
    }

    fn config_with(source: impl PageTextSource + 'static, budget: usize) -> ReviewConfig {
        ReviewConfig::builder()
            .text_source(Arc::new(source))
            .char_budget(budget)
            .build()
            .unwrap()
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), ("hé", true));
        assert_eq!(truncate_chars("插值方法", 3), ("插值方", true));
        assert_eq!(truncate_chars("abc", 3), ("abc", false));
        assert_eq!(truncate_chars("", 5), ("", false));
    }

    #[test]
    fn section_uses_paper_delimiters() {
        let mut corpus = ExtractedCorpus::default();
        let (chars, truncated) = corpus.push_section("a.pdf", "Hello", 8000);
        assert_eq!(chars, 5);
        assert!(!truncated);
        assert_eq!(
            corpus.text,
            "\n--- Start of Paper: a.pdf ---\nHello\n--- End of Paper ---\n"
        );
    }

    #[test]
    fn missing_pages_count_as_empty() {
        let pages = vec![Some("one".into()), None, Some("three".into())];
        assert_eq!(join_pages(&pages), "one\n\nthree");
    }

    #[tokio::test]
    async fn budget_applies_per_document() {
        let config = config_with(FixedPages(vec![Some("x".repeat(10_000))]), 8000);
        let report = extract(&[pdf("long.pdf")], &config).await.unwrap();
        let summary = report.documents[0].as_ref().unwrap();
        assert_eq!(summary.source_chars, 10_000);
        assert_eq!(summary.embedded_chars, 8000);
        assert!(summary.truncated);
        let body = report
            .corpus
            .text
            .strip_prefix("\n--- Start of Paper: long.pdf ---\n")
            .and_then(|s| s.strip_suffix("\n--- End of Paper ---\n"))
            .unwrap();
        assert_eq!(body.chars().count(), 8000);
    }

    #[tokio::test]
    async fn not_a_pdf_is_skipped() {
        let config = config_with(FixedPages(vec![Some("text".into())]), 100);
        let docs = [
            UploadedDocument::new("notes.txt", b"plain text".to_vec()),
            pdf("b.pdf"),
        ];
        let report = extract(&docs, &config).await.unwrap();
        assert_eq!(report.extracted_names(), vec!["b.pdf"]);
        assert!(matches!(
            report.failures().next(),
            Some(ExtractionError::NotAPdf { name, .. }) if name == "notes.txt"
        ));
    }

    #[tokio::test]
    async fn encrypted_document_is_a_diagnostic() {
        let config = config_with(Failing(PageTextError::Encrypted), 100);
        let report = extract(&[pdf("locked.pdf")], &config).await.unwrap();
        assert!(report.corpus.is_empty());
        assert_eq!(
            report.failures().next(),
            Some(&ExtractionError::Encrypted {
                name: "locked.pdf".into()
            })
        );
    }

    #[tokio::test]
    async fn missing_engine_aborts_batch() {
        let config = config_with(Failing(PageTextError::Engine("no libpdfium".into())), 100);
        let err = extract(&[pdf("a.pdf")], &config).await.unwrap_err();
        assert!(matches!(err, LitReviewError::PdfEngine(_)));
    }

    #[tokio::test]
    async fn empty_batch_yields_empty_report() {
        let config = config_with(FixedPages(Vec::new()), 100);
        let report = extract(&[], &config).await.unwrap();
        assert!(report.corpus.is_empty());
        assert_eq!(report.corpus.text, "");
        assert!(report.documents.is_empty());
    }
}
