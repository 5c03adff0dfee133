use std::path::Path;

use finsight_core::DocumentRef;

use crate::error::AnalysisError;

/// Regular files in `dir`, newest name first.
///
/// Report files are conventionally named by period, so reverse name order
/// puts the latest quarter first.
///
/// # Errors
///
/// Returns [`AnalysisError::Io`] if the directory cannot be read.
pub async fn list_local_documents(dir: &Path) -> Result<Vec<DocumentRef>, AnalysisError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut paths = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            paths.push(entry.path());
        }
    }

    paths.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
    Ok(paths.into_iter().map(DocumentRef::new).collect())
}
