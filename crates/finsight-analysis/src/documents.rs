//! Reading document text from disk.

use std::borrow::Cow;
use std::path::Path;

use async_trait::async_trait;

use crate::error::AnalysisError;

/// Leading bytes of every PDF file.
const PDF_SIGNATURE: &[u8] = b"%PDF-";

/// Turns a stored document into plain text.
#[async_trait]
pub trait DocumentReader: Send + Sync {
    /// # Errors
    ///
    /// Returns [`AnalysisError::Io`] if the file cannot be read, or
    /// [`AnalysisError::DocumentParse`] if its contents cannot be decoded.
    async fn read_text(&self, path: &Path) -> Result<String, AnalysisError>;
}

/// `text` with NUL characters removed. Postgres `TEXT` rejects them.
#[must_use]
pub fn without_nul(text: &str) -> Cow<'_, str> {
    if text.contains('\0') {
        Cow::Owned(text.replace('\0', ""))
    } else {
        Cow::Borrowed(text)
    }
}

fn lossy_text(bytes: &[u8]) -> String {
    without_nul(&String::from_utf8_lossy(bytes)).into_owned()
}

/// Extract the text layer of an in-memory PDF on the blocking pool.
async fn pdf_text(bytes: Vec<u8>) -> Result<String, AnalysisError> {
    let extracted = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| AnalysisError::DocumentParse(format!("PDF extraction aborted: {e}")))?
        .map_err(|e| AnalysisError::DocumentParse(format!("PDF extraction failed: {e}")))?;
    Ok(without_nul(&extracted).into_owned())
}

fn looks_like_pdf(path: &Path, bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_SIGNATURE)
        || path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Reads a file as text, replacing invalid UTF-8 sequences.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextReader;

#[async_trait]
impl DocumentReader for PlainTextReader {
    async fn read_text(&self, path: &Path) -> Result<String, AnalysisError> {
        let bytes = tokio::fs::read(path).await?;
        Ok(lossy_text(&bytes))
    }
}

/// Extracts the text layer of a PDF report.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTextReader;

#[async_trait]
impl DocumentReader for PdfTextReader {
    async fn read_text(&self, path: &Path) -> Result<String, AnalysisError> {
        let bytes = tokio::fs::read(path).await?;
        pdf_text(bytes).await
    }
}

/// Default reader for report files.
///
/// Files named `*.pdf` or starting with the PDF signature go through PDF text
/// extraction; anything else is read as text.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportReader;

#[async_trait]
impl DocumentReader for ReportReader {
    async fn read_text(&self, path: &Path) -> Result<String, AnalysisError> {
        let bytes = tokio::fs::read(path).await?;
        if looks_like_pdf(path, &bytes) {
            tracing::debug!(path = %path.display(), bytes = bytes.len(), "extracting PDF text");
            pdf_text(bytes).await
        } else {
            Ok(lossy_text(&bytes))
        }
    }
}
