//! REST endpoints for the planning session.

use std::future::Future;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use super::manager::PlanManager;
use crate::error::{Error, PlanError};

/// Shared state for planning routes.
#[derive(Clone)]
pub struct PlanRouteState {
    pub manager: Arc<PlanManager>,
}

#[derive(Deserialize)]
struct InputRequest {
    text: String,
}

/// Build the planning REST routes.
pub fn plan_routes(state: PlanRouteState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health))
        .route("/api/plan/status", get(get_status))
        .route("/api/plan/transcript", get(get_transcript))
        .route("/api/plan/recommendation", get(get_recommendation))
        .route("/api/plan/input", post(post_input))
        .route("/api/plan/export", post(post_export))
        .with_state(state)
        .layer(cors)
}

/// Serve the planning routes on `listener` until `shutdown` resolves, then
/// finish in-flight requests and return.
pub async fn serve_plan_api(
    listener: TcpListener,
    state: PlanRouteState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "Plan API server started");
    }
    axum::serve(listener, plan_routes(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    tracing::info!("Plan API server stopped");
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "plan-bot"
    }))
}

/// GET /api/plan/status
async fn get_status(State(state): State<PlanRouteState>) -> impl IntoResponse {
    Json(state.manager.status().await)
}

/// GET /api/plan/transcript
async fn get_transcript(State(state): State<PlanRouteState>) -> impl IntoResponse {
    Json(state.manager.transcript().await)
}

/// GET /api/plan/recommendation
///
/// 409 while the interview is still asking questions.
async fn get_recommendation(State(state): State<PlanRouteState>) -> Response {
    match state.manager.recommendation().await {
        Ok(recommendation) => Json(recommendation).into_response(),
        Err(e) => error_response(e.into()),
    }
}

/// POST /api/plan/input
///
/// Body: `{"text": "..."}`. Accepts the same commands as the CLI.
async fn post_input(
    State(state): State<PlanRouteState>,
    Json(body): Json<InputRequest>,
) -> Response {
    match state.manager.handle_input(&body.text).await {
        Ok(reply) => Json(reply).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/plan/export
async fn post_export(State(state): State<PlanRouteState>) -> Response {
    match state.manager.export().await {
        Ok(budget) => Json(budget).into_response(),
        Err(e) => error_response(e),
    }
}

fn error_response(err: Error) -> Response {
    let status = match &err {
        Error::Plan(PlanError::NotReady) => StatusCode::CONFLICT,
        Error::Plan(PlanError::Validation { .. }) => StatusCode::BAD_REQUEST,
        Error::Plan(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(error = %err, "Planning request failed");
    }
    (status, Json(serde_json::json!({"error": err.to_string()}))).into_response()
}
