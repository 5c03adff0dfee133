//! Database operations for the `request_logs` table.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `request_logs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RequestLogRow {
    pub id: i64,
    pub request_id: Uuid,
    pub input_query: String,
    pub response_json: Value,
    pub created_at: DateTime<Utc>,
}

/// Record one forecast request and its response payload.
///
/// `response_json` is the serialized forecast record; it is parsed here so the
/// column can be stored as JSONB.
///
/// # Errors
///
/// Returns [`DbError::InvalidPayload`] if the payload is not valid JSON, or
/// [`DbError::Sqlx`] if the insert fails.
pub async fn insert_request_log(
    pool: &PgPool,
    request_id: Uuid,
    input_query: &str,
    response_json: &str,
) -> Result<i64, DbError> {
    let payload: Value = serde_json::from_str(response_json)?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO request_logs (request_id, input_query, response_json) \
         VALUES ($1, $2, $3) \
         RETURNING id",
    )
    .bind(request_id)
    .bind(input_query)
    .bind(payload)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Fetch the log entry for a request id, or `None` if it was never stored.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_request_log(
    pool: &PgPool,
    request_id: Uuid,
) -> Result<Option<RequestLogRow>, DbError> {
    let row = sqlx::query_as::<_, RequestLogRow>(
        "SELECT id, request_id, input_query, response_json, created_at \
         FROM request_logs \
         WHERE request_id = $1",
    )
    .bind(request_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// List the most recent request logs, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_request_logs(pool: &PgPool, limit: i64) -> Result<Vec<RequestLogRow>, DbError> {
    let rows = sqlx::query_as::<_, RequestLogRow>(
        "SELECT id, request_id, input_query, response_json, created_at \
         FROM request_logs \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
