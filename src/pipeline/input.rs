//! Input resolution: turn user-selected file paths into uploaded documents.
//!
//! The whole file is read into memory up front. pdfium can open a PDF from
//! a byte slice, the papers are small, and it makes an
//! [`UploadedDocument`] a plain immutable value that the caller owns for
//! the duration of one run. Read failures are per-file diagnostics, never
//! fatal to the batch.

use crate::error::ExtractionError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// How far into the file the `%PDF` signature may appear. pdfium tolerates
/// leading junk within the first kilobyte, so we do too.
const MAGIC_SEARCH_WINDOW: usize = 1024;

/// One uploaded paper: its display name and raw PDF bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadedDocument {
    name: String,
    bytes: Arc<[u8]>,
}

impl UploadedDocument {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: Arc::from(bytes.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Cheap shared handle on the bytes, for moving into a blocking task.
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    /// Whether the `%PDF` signature appears near the start of the file.
    pub fn looks_like_pdf(&self) -> bool {
        let window = &self.bytes[..self.bytes.len().min(MAGIC_SEARCH_WINDOW)];
        window.windows(4).any(|w| w == b"%PDF")
    }

    /// The first (up to) four bytes, for diagnostics.
    pub fn magic(&self) -> Vec<u8> {
        self.bytes.iter().take(4).copied().collect()
    }
}

impl fmt::Debug for UploadedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedDocument")
            .field("name", &self.name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Display name for a path: the file name, falling back to the full path.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Read one file into an [`UploadedDocument`].
pub async fn read_document(path: &Path) -> Result<UploadedDocument, ExtractionError> {
    let name = display_name(path);
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ExtractionError::Unreadable {
            name: name.clone(),
            detail: e.to_string(),
        })?;
    debug!("Read {} ({} bytes)", name, bytes.len());
    Ok(UploadedDocument::new(name, bytes))
}

/// Read every path in order. Unreadable files are returned as diagnostics
/// and skipped; the remaining documents keep their relative order.
pub async fn read_documents(paths: &[PathBuf]) -> (Vec<UploadedDocument>, Vec<ExtractionError>) {
    let mut documents = Vec::with_capacity(paths.len());
    let mut failures = Vec::new();
    for path in paths {
        match read_document(path).await {
            Ok(doc) => documents.push(doc),
            Err(e) => failures.push(e),
        }
    }
    (documents, failures)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_pdf_signature() {
        let doc = UploadedDocument::new("a.pdf", b"%PDF-1.7\n...".to_vec());
        assert!(doc.looks_like_pdf());
        let doc = UploadedDocument::new("junk.pdf", b"\n\n%PDF-1.4".to_vec());
        assert!(doc.looks_like_pdf(), "leading junk is tolerated");
        let doc = UploadedDocument::new("notes.txt", b"hello world".to_vec());
        assert!(!doc.looks_like_pdf());
        assert_eq!(doc.magic(), b"hell".to_vec());
    }

    #[test]
    fn bytes_are_shared_not_copied() {
        let doc = UploadedDocument::new("a.pdf", b"%PDF-1.7\nbody".to_vec());
        let copy = doc.clone();
        assert_eq!(copy.bytes(), b"%PDF-1.7\nbody");
        assert!(Arc::ptr_eq(&doc.shared_bytes(), &copy.shared_bytes()));
    }

    #[test]
    fn empty_file_is_not_a_pdf() {
        let doc = UploadedDocument::new("empty.pdf", Vec::new());
        assert!(!doc.looks_like_pdf());
        assert!(doc.magic().is_empty());
    }

    #[test]
    fn debug_omits_bytes() {
        let doc = UploadedDocument::new("a.pdf", vec![0u8; 2048]);
        let dbg = format!("{doc:?}");
        assert!(dbg.contains("a.pdf"));
        assert!(dbg.contains("2048"));
    }

    #[test]
    fn display_name_uses_file_name() {
        assert_eq!(display_name(Path::new("/tmp/papers/nurbs.pdf")), "nurbs.pdf");
    }

    #[tokio::test]
    async fn read_documents_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.pdf");
        std::fs::write(&good, b"%PDF-1.4 stub").unwrap();
        let missing = dir.path().join("missing.pdf");

        let (docs, failures) = read_documents(&[missing, good]).await;
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].name(), "good.pdf");
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].document(), "missing.pdf");
    }
}
