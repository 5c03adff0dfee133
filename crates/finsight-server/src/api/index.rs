use axum::{extract::State, Extension, Json};
use serde::Serialize;

use crate::middleware::RequestId;

use super::{ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct IndexStats {
    pub entries: usize,
    pub dimension: Option<usize>,
    pub model_dimension: Option<usize>,
}

#[derive(Debug, Serialize)]
pub(super) struct IndexReset {
    pub removed: usize,
}

pub(super) async fn index_stats(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<IndexStats>> {
    let index = state.context.index();
    Json(ApiResponse {
        data: IndexStats {
            entries: index.len().await,
            dimension: index.dimension().await,
            model_dimension: index.model_dimension(),
        },
        meta: ResponseMeta::new(req_id.0),
    })
}

pub(super) async fn reset_index(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<IndexReset>> {
    let removed = state.context.index().reset().await;
    Json(ApiResponse {
        data: IndexReset { removed },
        meta: ResponseMeta::new(req_id.0),
    })
}
