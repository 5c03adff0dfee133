mod forecast;
mod index;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use finsight_analysis::{ForecastContext, SourcingClient};
use finsight_core::Transcript;
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{
    enforce_rate_limit, request_id, require_bearer_auth, AuthState, RateLimitState, RequestId,
};

#[derive(Clone)]
pub struct AppState {
    pub context: Arc<ForecastContext>,
    pub sourcing: Arc<SourcingClient>,
    pub transcripts: Arc<Vec<Transcript>>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
    index_entries: usize,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn map_db_error(request_id: String, error: &finsight_db::DbError) -> ApiError {
    tracing::error!(error = %error, "database query failed");
    ApiError::new(request_id, "internal_error", "database query failed")
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(auth: AuthState, rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/forecast", post(forecast::create_forecast))
        .route(
            "/api/v1/forecasts/{request_id}",
            get(forecast::get_forecast),
        )
        .route(
            "/api/v1/index",
            get(index::index_stats).delete(index::reset_index),
        )
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_bearer_auth,
                )),
        )
}

pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);
    let index_entries = state.context.index().len().await;

    let Some(pool) = state.context.pool() else {
        return (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "disabled",
                    index_entries,
                },
                meta,
            }),
        );
    };

    match finsight_db::health_check(pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                    index_entries,
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                        index_entries,
                    },
                    meta,
                }),
            )
        }
    }
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(60, Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use finsight_analysis::pipeline::NOT_CONFIGURED_SUMMARY;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let mut config = finsight_core::load_app_config_from_env().expect("config");
        config.database_url = None;
        config.tei_url = None;
        config.openai_api_key = None;
        config.screener_url = None;
        config.hash_embedding_dim = 32;
        config.documents_dir =
            std::env::temp_dir().join(format!("finsight-server-{}", uuid::Uuid::new_v4()));

        let context = ForecastContext::build(&config, None).expect("context");
        let sourcing = SourcingClient::from_config(&config).expect("sourcing");
        AppState {
            context: Arc::new(context),
            sourcing: Arc::new(sourcing),
            transcripts: Arc::new(finsight_core::default_transcripts()),
        }
    }

    fn open_app(state: AppState) -> Router {
        let auth = AuthState::from_keys("", true).expect("auth");
        build_app(state, auth, default_rate_limit_state())
    }

    fn post_forecast(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/forecast")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request")
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&body).expect("json parse")
    }

    #[test]
    fn api_error_validation_error_maps_to_bad_request() {
        let response = ApiError::new("req-1", "validation_error", "invalid input").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn api_error_unknown_code_maps_to_internal_error() {
        let response = ApiError::new("req-1", "internal_error", "boom").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn health_reports_disabled_database_and_index_size() {
        let response = open_app(test_state())
            .oneshot(get("/api/v1/health"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let json = json_body(response).await;
        assert_eq!(json["data"]["status"], "ok");
        assert_eq!(json["data"]["database"], "disabled");
        assert_eq!(json["data"]["index_entries"], 0);
    }

    #[tokio::test]
    async fn request_id_header_is_echoed() {
        let response = open_app(test_state())
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .header("x-request-id", "req-abc")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(
            response.headers().get("x-request-id").and_then(|v| v.to_str().ok()),
            Some("req-abc")
        );
        let json = json_body(response).await;
        assert_eq!(json["meta"]["request_id"], "req-abc");
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let response = open_app(test_state())
            .oneshot(post_forecast(r#"{"query": "   "}"#))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["error"]["code"], "validation_error");
    }

    #[tokio::test]
    async fn quarters_out_of_range_are_rejected() {
        for body in [
            r#"{"query": "outlook", "quarters": 0}"#,
            r#"{"query": "outlook", "quarters": 13}"#,
        ] {
            let response = open_app(test_state())
                .oneshot(post_forecast(body))
                .await
                .expect("response");
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
        }
    }

    #[tokio::test]
    async fn index_stats_report_model_dimension_before_first_entry() {
        let app = open_app(test_state());
        let stats = json_body(app.oneshot(get("/api/v1/index")).await.expect("response")).await;
        assert_eq!(stats["data"]["entries"], 0);
        assert!(stats["data"]["dimension"].is_null());
        assert_eq!(stats["data"]["model_dimension"], 32);
    }

    #[tokio::test]
    async fn forecast_without_model_returns_degraded_record() {
        let state = test_state();
        let app = open_app(state.clone());

        let response = app
            .clone()
            .oneshot(post_forecast(
                r#"{"query": "What is the outlook?", "include_market_data": true}"#,
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["forecast_summary"], NOT_CONFIGURED_SUMMARY);
        assert_eq!(json["financial_trends"], serde_json::json!({}));
        assert_eq!(json["metadata"]["extracted_metrics"], serde_json::json!([]));
        assert!(json["request_id"].is_string());

        let stats = json_body(app.oneshot(get("/api/v1/index")).await.expect("response")).await;
        assert_eq!(stats["data"]["entries"], 3);
        assert_eq!(stats["data"]["dimension"], 32);
    }

    #[tokio::test]
    async fn index_reset_reports_removed_entries() {
        let state = test_state();
        let app = open_app(state.clone());
        app.clone()
            .oneshot(post_forecast(r#"{"query": "margins"}"#))
            .await
            .expect("response");

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/v1/index")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["data"]["removed"], 3);
        assert!(state.context.index().is_empty().await);
    }

    #[tokio::test]
    async fn stored_forecast_is_not_found_without_database() {
        let uri = format!("/api/v1/forecasts/{}", uuid::Uuid::new_v4());
        let response = open_app(test_state())
            .oneshot(get(&uri))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = json_body(response).await;
        assert_eq!(json["error"]["code"], "not_found");
    }

    #[tokio::test]
    async fn protected_routes_require_bearer_token() {
        let auth = AuthState::from_keys("secret-key", false).expect("auth");
        let app = build_app(test_state(), auth, default_rate_limit_state());

        let health = app
            .clone()
            .oneshot(get("/api/v1/health"))
            .await
            .expect("response");
        assert_eq!(health.status(), StatusCode::OK);

        let denied = app
            .clone()
            .oneshot(get("/api/v1/index"))
            .await
            .expect("response");
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

        let allowed = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/index")
                    .header(header::AUTHORIZATION, "Bearer secret-key")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(allowed.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn rate_limit_rejects_requests_over_the_window() {
        let auth = AuthState::from_keys("", true).expect("auth");
        let app = build_app(
            test_state(),
            auth,
            RateLimitState::new(1, Duration::from_secs(60)),
        );

        let first = app
            .clone()
            .oneshot(get("/api/v1/index"))
            .await
            .expect("response");
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.oneshot(get("/api/v1/index")).await.expect("response");
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        let json = json_body(second).await;
        assert_eq!(json["error"]["code"], "rate_limited");
    }
}
