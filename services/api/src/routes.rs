use crate::infra::AppState;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use insertion_gate::error::AppError;
use insertion_gate::insertion::{
    DetectorStatus, DocumentInserter, DocumentPublisher, LockableFingerprintProvider, PollOutcome,
    Ticker,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub(crate) struct DocumentStatusView {
    pub(crate) modified: bool,
    #[serde(flatten)]
    pub(crate) detector: DetectorStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InsertionDelayRequest {
    pub(crate) seconds: u32,
}

pub(crate) fn with_document_routes<P, B, T>(inserter: Arc<DocumentInserter<P, B, T>>) -> Router
where
    P: LockableFingerprintProvider + 'static,
    B: DocumentPublisher + 'static,
    T: Ticker + 'static,
{
    Router::new()
        .route("/api/v1/document/status", get(status_endpoint::<P, B, T>))
        .route(
            "/api/v1/document/insertion-delay",
            put(insertion_delay_endpoint::<P, B, T>),
        )
        .route("/api/v1/document/insert", post(insert_endpoint::<P, B, T>))
        .with_state(inserter)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

fn status_view<P, B, T>(inserter: &DocumentInserter<P, B, T>) -> DocumentStatusView
where
    P: LockableFingerprintProvider,
    B: DocumentPublisher,
    T: Ticker,
{
    DocumentStatusView {
        modified: inserter.is_modified(),
        detector: inserter.status(),
    }
}

pub(crate) async fn status_endpoint<P, B, T>(
    State(inserter): State<Arc<DocumentInserter<P, B, T>>>,
) -> Json<DocumentStatusView>
where
    P: LockableFingerprintProvider + 'static,
    B: DocumentPublisher + 'static,
    T: Ticker + 'static,
{
    Json(status_view(&inserter))
}

pub(crate) async fn insertion_delay_endpoint<P, B, T>(
    State(inserter): State<Arc<DocumentInserter<P, B, T>>>,
    Json(request): Json<InsertionDelayRequest>,
) -> Json<DocumentStatusView>
where
    P: LockableFingerprintProvider + 'static,
    B: DocumentPublisher + 'static,
    T: Ticker + 'static,
{
    inserter.set_insertion_delay(request.seconds);
    Json(status_view(&inserter))
}

/// Runs one poll right away instead of waiting for the next tick.
pub(crate) async fn insert_endpoint<P, B, T>(
    State(inserter): State<Arc<DocumentInserter<P, B, T>>>,
) -> Result<Json<PollOutcome>, AppError>
where
    P: LockableFingerprintProvider + 'static,
    B: DocumentPublisher + 'static,
    T: Ticker + 'static,
{
    let outcome = tokio::task::spawn_blocking(move || inserter.poll_once()).await??;
    Ok(Json(outcome))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
