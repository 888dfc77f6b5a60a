//! HTTP surface — Telegram webhook ingestion, the wheel web app, and a
//! small operator API.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tokio::sync::mpsc::UnboundedSender;
use tower_http::services::ServeDir;

use crate::channels::telegram::{classify, Update};
use crate::funnel::InboundEvent;
use crate::store::Database;

/// Shared state for the HTTP routes.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn Database>,
    pub events: UnboundedSender<InboundEvent>,
    /// Bot token expected in the webhook path — Telegram's recommended
    /// way to authenticate webhook calls.
    pub webhook_token: Arc<String>,
}

/// Build the router: webhook endpoint, operator API, and the static
/// wheel web app as the fallback.
pub fn routes(state: AppState, webapp_dir: PathBuf) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/leads", get(recent_leads))
        .route("/bot/{token}", post(telegram_webhook))
        .with_state(state)
        .fallback_service(ServeDir::new(webapp_dir))
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
struct LeadsQuery {
    limit: Option<usize>,
}

/// GET /api/leads?limit=N
///
/// Most recent captured leads, newest first.
async fn recent_leads(
    State(state): State<AppState>,
    Query(query): Query<LeadsQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(50).min(500);
    match state.db.recent_leads(limit).await {
        Ok(leads) => Json(serde_json::json!({ "leads": leads })).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to list leads");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "lead store unavailable" })),
            )
                .into_response()
        }
    }
}

/// POST /bot/{token}
///
/// Telegram webhook endpoint. Always acknowledges with 200 once the
/// token matches — processing failures must never trigger Telegram's
/// redelivery storm.
async fn telegram_webhook(
    State(state): State<AppState>,
    Path(token): Path<String>,
    body: String,
) -> StatusCode {
    if token != *state.webhook_token {
        tracing::warn!("Webhook call with mismatched token");
        return StatusCode::NOT_FOUND;
    }

    match serde_json::from_str::<Update>(&body) {
        Ok(update) => {
            if let Some(event) = classify(&update) {
                if state.events.send(event).is_err() {
                    tracing::error!("Event pipeline closed; dropping webhook update");
                }
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring unparseable webhook body");
        }
    }

    StatusCode::OK
}
