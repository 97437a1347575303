use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;

use crate::bootstrap::AppRuntime;
use crate::orchestrator::{BatchError, BatchReport};
use crate::record::StartupRecord;
use crate::store::{PersistenceError, StartupFilter};

#[derive(Clone)]
pub struct AppState {
    runtime: Arc<AppRuntime>,
    // One batch at a time: normalization must be the only writer.
    batch_gate: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(runtime: AppRuntime) -> Self {
        Self {
            runtime: Arc::new(runtime),
            batch_gate: Arc::new(Mutex::new(())),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/startups", get(list_startups))
        .route("/api/companies", post(query_companies))
        .route("/api/evaluate", post(run_batch))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

pub enum ApiError {
    Store(PersistenceError),
    Batch(BatchError),
    Busy,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            ApiError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            ApiError::Batch(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            ApiError::Busy => (StatusCode::CONFLICT, "a batch run is already in progress".into()),
        };
        tracing::warn!(status = status.as_u16(), error = %msg, "api error");
        (status, Json(json!({ "error": msg }))).into_response()
    }
}

async fn list_startups(State(state): State<AppState>) -> Result<Json<Vec<StartupRecord>>, ApiError> {
    let all = state.runtime.store.find_all().await.map_err(ApiError::Store)?;
    Ok(Json(all))
}

async fn query_companies(
    State(state): State<AppState>,
    Json(filter): Json<StartupFilter>,
) -> Result<Json<Vec<StartupRecord>>, ApiError> {
    let hits = state.runtime.store.query(&filter).await.map_err(ApiError::Store)?;
    Ok(Json(hits))
}

async fn run_batch(State(state): State<AppState>) -> Result<Json<BatchReport>, ApiError> {
    let _gate = state.batch_gate.try_lock().map_err(|_| ApiError::Busy)?;
    let report = state
        .runtime
        .orchestrator()
        .run()
        .await
        .map_err(ApiError::Batch)?;
    Ok(Json(report))
}
