use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use finsight_core::{ForecastRecord, ForecastRequest};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

const MAX_QUARTERS: u32 = 12;

#[derive(Debug, Serialize)]
pub(super) struct StoredForecast {
    pub request_id: Uuid,
    pub input_query: String,
    pub response: Value,
    pub created_at: DateTime<Utc>,
}

fn validate(req_id: &str, request: &ForecastRequest) -> Result<(), ApiError> {
    if request.query.trim().is_empty() {
        return Err(ApiError::new(
            req_id,
            "validation_error",
            "query must not be empty",
        ));
    }
    if !(1..=MAX_QUARTERS).contains(&request.quarters) {
        return Err(ApiError::new(
            req_id,
            "validation_error",
            format!("quarters must be between 1 and {MAX_QUARTERS}"),
        ));
    }
    Ok(())
}

pub(super) async fn create_forecast(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(request): Json<ForecastRequest>,
) -> Result<Json<ForecastRecord>, ApiError> {
    validate(&req_id.0, &request)?;

    tracing::info!(
        http_request_id = %req_id.0,
        quarters = request.quarters,
        include_market_data = request.include_market_data,
        "forecast requested"
    );

    let documents = state
        .sourcing
        .collect_documents(request.quarters as usize)
        .await;

    let record = state
        .context
        .orchestrator()
        .generate(request.query.trim(), &documents, &state.transcripts)
        .await
        .map_err(|e| {
            tracing::error!(http_request_id = %req_id.0, error = %e, "forecast generation failed");
            ApiError::new(req_id.0.clone(), "internal_error", "forecast generation failed")
        })?;

    Ok(Json(record))
}

pub(super) async fn get_forecast(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(request_id): Path<Uuid>,
) -> Result<Json<ApiResponse<StoredForecast>>, ApiError> {
    let not_found = || ApiError::new(req_id.0.clone(), "not_found", "forecast not found");

    let Some(pool) = state.context.pool() else {
        return Err(not_found());
    };

    let row = finsight_db::get_request_log(pool, request_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(not_found)?;

    Ok(Json(ApiResponse {
        data: StoredForecast {
            request_id: row.request_id,
            input_query: row.input_query,
            response: row.response_json,
            created_at: row.created_at,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
