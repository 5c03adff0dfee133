use std::path::{Path, PathBuf};

use reqwest::{Client, Response, Url};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::AnalysisError;

/// Local file name for a document URL: the last non-empty path segment, with
/// query string and fragment dropped. Falls back to `document`.
#[must_use]
pub fn file_name_for_url(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
                .map(str::to_string)
        })
        .unwrap_or_else(|| "document".to_string())
}

/// Stream `url` into `dir`, creating the directory if needed.
///
/// Bytes land in a hidden `.part` file that is renamed over the final name
/// only once the body is complete, so readers never see a truncated document.
pub(super) async fn download_to_dir(
    client: &Client,
    url: &str,
    dir: &Path,
) -> Result<PathBuf, AnalysisError> {
    let mut response = client.get(url).send().await?.error_for_status()?;

    tokio::fs::create_dir_all(dir).await?;
    let name = file_name_for_url(url);
    let path = dir.join(&name);
    let partial = dir.join(format!(".{name}.{}.part", Uuid::new_v4()));

    match write_body(&mut response, &partial).await {
        Ok(written) => {
            if let Err(e) = tokio::fs::rename(&partial, &path).await {
                tokio::fs::remove_file(&partial).await.ok();
                return Err(e.into());
            }
            tracing::debug!(url, path = %path.display(), bytes = written, "document downloaded");
            Ok(path)
        }
        Err(e) => {
            tokio::fs::remove_file(&partial).await.ok();
            tracing::warn!(url, error = %e, "document download aborted");
            Err(e)
        }
    }
}

async fn write_body(response: &mut Response, path: &Path) -> Result<usize, AnalysisError> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0_usize;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len();
    }
    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}
