//! HTTP surface over [`Relay`].

use std::future::Future;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::consts::{DEFAULT_LIST_LIMIT, MAX_BODY_BYTES};
use crate::dispatcher::new_request_id;
use crate::error::RelayError;
use crate::service::{Relay, RunStatus};

/// Error body: `{ "error": ..., "reqId": ... }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    req_id: Option<String>,
}

impl ApiError {
    fn bad_request(message: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.to_string(),
            req_id: None,
        }
    }

    fn from_relay(err: RelayError, req_id: Option<String>) -> Self {
        let status = match &err {
            RelayError::NotFound(_) => StatusCode::NOT_FOUND,
            RelayError::EmptyContent => StatusCode::BAD_REQUEST,
            RelayError::DuplicateRequest(_) => StatusCode::CONFLICT,
            RelayError::Discovery(_) | RelayError::Submission(_) => StatusCode::BAD_GATEWAY,
            RelayError::Schedule(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if err.is_upstream() {
            error!(request_id = req_id.as_deref().unwrap_or("-"), error = %err, "create-run failed");
        }
        Self {
            status,
            message: err.to_string(),
            req_id,
        }
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        Self::from_relay(err, None)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({ "error": self.message });
        if let Some(req_id) = self.req_id {
            body["reqId"] = Value::String(req_id);
        }
        (self.status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct RunsQuery {
    limit: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusQuery {
    req_id: Option<String>,
    raw: Option<String>,
}

/// The `text` of a chat body. The body is read leniently: a missing or
/// non-JSON body counts as `{}`, and scalar values are taken as their string
/// form, so every bad request ends up as "Missing text".
fn chat_text(body: &[u8]) -> String {
    let body: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
    match body.get("text") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(n)) if n.as_f64() != Some(0.0) => n.to_string(),
        Some(Value::Bool(true)) => "true".to_string(),
        _ => String::new(),
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "ok": true, "now": chrono::Utc::now().to_rfc3339() }))
}

async fn list_runs(State(relay): State<Arc<Relay>>, Query(q): Query<RunsQuery>) -> Json<Value> {
    let limit = q
        .limit
        .as_deref()
        .and_then(|l| l.trim().parse::<usize>().ok())
        .unwrap_or(DEFAULT_LIST_LIMIT);
    Json(json!({ "runs": relay.list_runs(limit).await }))
}

async fn chat_status(
    State(relay): State<Arc<Relay>>,
    Query(q): Query<StatusQuery>,
) -> Result<Json<RunStatus>, ApiError> {
    let req_id = q.req_id.as_deref().map(str::trim).unwrap_or("");
    if req_id.is_empty() {
        return Err(ApiError::bad_request("Missing reqId"));
    }
    let include_raw = q.raw.as_deref().filter(|r| !r.is_empty()).unwrap_or("1") == "1";
    Ok(Json(relay.get_status(req_id, include_raw).await?))
}

async fn chat(State(relay): State<Arc<Relay>>, body: Bytes) -> Response {
    let req_id = new_request_id();
    let text = chat_text(&body);
    match relay.create_run(Some(req_id.clone()), &text).await {
        Ok(ticket) => Json(ticket).into_response(),
        Err(RelayError::EmptyContent) => ApiError::bad_request("Missing text").into_response(),
        Err(e) => ApiError::from_relay(e, Some(req_id)).into_response(),
    }
}

/// All routes, with CORS that mirrors the caller's origin.
pub fn router(relay: Arc<Relay>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/runs", get(list_runs))
        .route("/chat/status", get(chat_status))
        .route("/chat", post(chat))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(relay)
}

/// Serve until `shutdown` resolves.
pub async fn serve(
    relay: Arc<Relay>,
    listener: TcpListener,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(listener, router(relay))
        .with_graceful_shutdown(shutdown)
        .await
}
