//! Database operations for the `raw_documents` archive.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `raw_documents` table, without the (potentially large) content.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RawDocumentRow {
    pub id: i64,
    pub source: String,
    pub url: Option<String>,
    pub filename: String,
    pub content_sha256: String,
    pub created_at: DateTime<Utc>,
}

/// Hex-encoded SHA-256 of a document's text.
#[must_use]
pub fn content_sha256(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Archive the extracted text of one document.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_raw_document(
    pool: &PgPool,
    source: &str,
    url: Option<&str>,
    filename: &str,
    content: &str,
) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO raw_documents (source, url, filename, content, content_sha256) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING id",
    )
    .bind(source)
    .bind(url)
    .bind(filename)
    .bind(content)
    .bind(content_sha256(content))
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// List recently archived documents, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_raw_documents(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<RawDocumentRow>, DbError> {
    let rows = sqlx::query_as::<_, RawDocumentRow>(
        "SELECT id, source, url, filename, content_sha256, created_at \
         FROM raw_documents \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
