//! Document sourcing: scrape a company's document listing, download the
//! linked reports, or fall back to files already in the documents directory.

mod download;
mod listing;
mod local;

use std::path::{Path, PathBuf};
use std::time::Duration;

use finsight_core::{AppConfig, DocumentRef};
use reqwest::Client;

use crate::error::AnalysisError;

pub use download::file_name_for_url;
pub use listing::extract_document_links;
pub use local::list_local_documents;

/// A document advertised on a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentLink {
    pub title: String,
    pub url: String,
}

pub struct SourcingClient {
    client: Client,
    documents_dir: PathBuf,
    listing_url: Option<String>,
}

impl SourcingClient {
    /// # Errors
    ///
    /// Returns [`AnalysisError::Http`] if the HTTP client cannot be built.
    pub fn new(
        documents_dir: impl Into<PathBuf>,
        listing_url: Option<String>,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, AnalysisError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            documents_dir: documents_dir.into(),
            listing_url,
        })
    }

    /// # Errors
    ///
    /// Returns [`AnalysisError::Http`] if the HTTP client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self, AnalysisError> {
        Self::new(
            config.documents_dir.clone(),
            config.screener_url.clone(),
            config.scraper_request_timeout_secs,
            &config.scraper_user_agent,
        )
    }

    #[must_use]
    pub fn documents_dir(&self) -> &Path {
        &self.documents_dir
    }

    /// Fetch `page_url` and collect the links in its documents table.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Http`] on network failure or non-2xx status.
    pub async fn list_documents(&self, page_url: &str) -> Result<Vec<DocumentLink>, AnalysisError> {
        let html = self
            .client
            .get(page_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(extract_document_links(&html, page_url))
    }

    /// Download `url` into the documents directory.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Http`] on network failure or non-2xx status,
    /// [`AnalysisError::Io`] if the file cannot be written.
    pub async fn download(&self, url: &str) -> Result<PathBuf, AnalysisError> {
        download::download_to_dir(&self.client, url, &self.documents_dir).await
    }

    /// Up to `limit` documents ready for extraction.
    ///
    /// With a listing URL, the first `limit` listed documents are downloaded;
    /// otherwise the newest-named local files are used. Listing and download
    /// failures are logged and skipped.
    pub async fn collect_documents(&self, limit: usize) -> Vec<DocumentRef> {
        let Some(listing_url) = self.listing_url.as_deref() else {
            return match list_local_documents(&self.documents_dir).await {
                Ok(mut documents) => {
                    documents.truncate(limit);
                    documents
                }
                Err(e) => {
                    tracing::warn!(
                        dir = %self.documents_dir.display(),
                        error = %e,
                        "local document listing failed"
                    );
                    Vec::new()
                }
            };
        };

        let links = match self.list_documents(listing_url).await {
            Ok(links) => links,
            Err(e) => {
                tracing::warn!(url = listing_url, error = %e, "document listing fetch failed");
                return Vec::new();
            }
        };
        tracing::debug!(url = listing_url, count = links.len(), "document links collected");

        let mut documents = Vec::new();
        for link in links.into_iter().take(limit) {
            match self.download(&link.url).await {
                Ok(path) => documents.push(DocumentRef {
                    path,
                    url: Some(link.url),
                    title: Some(link.title),
                }),
                Err(e) => {
                    tracing::warn!(url = %link.url, error = %e, "document download failed");
                }
            }
        }
        documents
    }
}
