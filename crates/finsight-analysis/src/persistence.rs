//! Best-effort collaborators for archiving document text and logging forecast
//! requests. Postgres-backed when a pool is configured, `tracing`-only
//! otherwise.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AnalysisError;

#[async_trait]
pub trait DocumentArchive: Send + Sync {
    /// # Errors
    ///
    /// Returns [`AnalysisError::PersistenceFailure`] if the write fails.
    async fn save(
        &self,
        source_kind: &str,
        source_url: Option<&str>,
        filename: &str,
        content: &str,
    ) -> Result<(), AnalysisError>;
}

#[async_trait]
pub trait RequestLog: Send + Sync {
    /// # Errors
    ///
    /// Returns [`AnalysisError::PersistenceFailure`] if the write fails.
    async fn log(
        &self,
        request_id: Uuid,
        input_query: &str,
        response_payload: &str,
    ) -> Result<(), AnalysisError>;
}

pub struct PgDocumentArchive {
    pool: PgPool,
}

impl PgDocumentArchive {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentArchive for PgDocumentArchive {
    async fn save(
        &self,
        source_kind: &str,
        source_url: Option<&str>,
        filename: &str,
        content: &str,
    ) -> Result<(), AnalysisError> {
        finsight_db::insert_raw_document(&self.pool, source_kind, source_url, filename, content)
            .await
            .map_err(|e| AnalysisError::PersistenceFailure(e.to_string()))?;
        Ok(())
    }
}

pub struct PgRequestLog {
    pool: PgPool,
}

impl PgRequestLog {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RequestLog for PgRequestLog {
    async fn log(
        &self,
        request_id: Uuid,
        input_query: &str,
        response_payload: &str,
    ) -> Result<(), AnalysisError> {
        finsight_db::insert_request_log(&self.pool, request_id, input_query, response_payload)
            .await
            .map_err(|e| AnalysisError::PersistenceFailure(e.to_string()))?;
        Ok(())
    }
}

/// Records archival as a log line only.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDocumentArchive;

#[async_trait]
impl DocumentArchive for TracingDocumentArchive {
    async fn save(
        &self,
        source_kind: &str,
        source_url: Option<&str>,
        filename: &str,
        content: &str,
    ) -> Result<(), AnalysisError> {
        tracing::info!(
            source = source_kind,
            url = source_url.unwrap_or(""),
            filename,
            chars = content.chars().count(),
            "document text captured (no database configured)"
        );
        Ok(())
    }
}

/// Records forecast requests as a log line only.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingRequestLog;

#[async_trait]
impl RequestLog for TracingRequestLog {
    async fn log(
        &self,
        request_id: Uuid,
        input_query: &str,
        response_payload: &str,
    ) -> Result<(), AnalysisError> {
        tracing::info!(
            request_id = %request_id,
            query = input_query,
            bytes = response_payload.len(),
            "forecast request completed (no database configured)"
        );
        Ok(())
    }
}

/// Log and drop a failed best-effort write.
pub(crate) fn discard_failure(stage: &'static str, result: Result<(), AnalysisError>) {
    if let Err(e) = result {
        tracing::warn!(stage, error = %e, "best-effort persistence failed; continuing");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tracing_collaborators_always_succeed() {
        TracingDocumentArchive
            .save("pdf", None, "q1.pdf", "text")
            .await
            .expect("archive");
        TracingRequestLog
            .log(Uuid::new_v4(), "query", "{}")
            .await
            .expect("log");
    }

    #[test]
    fn discard_failure_swallows_errors() {
        discard_failure(
            "archive",
            Err(AnalysisError::PersistenceFailure("disk full".to_string())),
        );
        discard_failure("archive", Ok(()));
    }
}
