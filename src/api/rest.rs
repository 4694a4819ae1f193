// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`.  Every handler reads published views
// only; the single writer is the timeframe switch, which goes through the
// engine and then wakes the feed supervisor via a watch channel.
//
// CORS is configured permissively.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::engine::SignalEngine;
use crate::ranking::{rank, signal_stats, RankingFilter};
use crate::signals::SignalCategory;
use crate::types::Timeframe;

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(serde_json::json!({ "error": message.into() })))
}

/// Shared state behind every handler.
pub struct ApiState {
    pub engine: Arc<SignalEngine>,
    pub timeframe_tx: watch::Sender<Timeframe>,
    pub freshness_window_ms: i64,
}

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<ApiState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/signals", get(signals))
        .route("/api/v1/signals/stats", get(stats))
        .route("/api/v1/signals/:symbol", get(instrument))
        .route("/api/v1/timeframe", get(get_timeframe).post(set_timeframe))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    timeframe: Timeframe,
    instruments: usize,
    server_time: i64,
}

async fn health(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let resp = HealthResponse {
        status: "ok",
        state_version: state.engine.current_state_version(),
        timeframe: state.engine.timeframe(),
        instruments: state.engine.instrument_count(),
        server_time: chrono::Utc::now().timestamp_millis(),
    };
    Json(resp)
}

// =============================================================================
// Signals
// =============================================================================

/// Raw query string; empty values and `all` mean "no filter".
#[derive(Debug, Default, Deserialize)]
struct SignalQuery {
    category: Option<String>,
    min_volume: Option<f64>,
    search: Option<String>,
}

impl SignalQuery {
    fn into_filter(self) -> Result<RankingFilter, ApiError> {
        let category = match self.category.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(c) if c.eq_ignore_ascii_case("all") => None,
            Some(c) => Some(
                c.parse::<SignalCategory>()
                    .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?,
            ),
        };
        Ok(RankingFilter {
            category,
            min_quote_volume: self.min_volume.unwrap_or(0.0),
            search: self.search.filter(|s| !s.trim().is_empty()),
        })
    }
}

async fn signals(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<SignalQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = query.into_filter()?;
    let views = state.engine.snapshots();
    let now = chrono::Utc::now().timestamp_millis();
    Ok(Json(rank(&views, &filter, now, state.freshness_window_ms)))
}

async fn stats(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<SignalQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = query.into_filter()?;
    let views = state.engine.snapshots();
    Ok(Json(signal_stats(&views, &filter)))
}

async fn instrument(
    State(state): State<Arc<ApiState>>,
    Path(symbol): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let symbol = symbol.to_uppercase();
    state
        .engine
        .get_snapshot(&symbol)
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("unknown instrument: {symbol}")))
}

// =============================================================================
// Timeframe
// =============================================================================

#[derive(Serialize)]
struct TimeframeResponse {
    timeframe: Timeframe,
    changed: bool,
}

#[derive(Deserialize)]
struct TimeframeRequest {
    timeframe: String,
}

async fn get_timeframe(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(TimeframeResponse {
        timeframe: state.engine.timeframe(),
        changed: false,
    })
}

async fn set_timeframe(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<TimeframeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let timeframe: Timeframe = req
        .timeframe
        .parse()
        .map_err(|e: crate::error::ParseTimeframeError| {
            api_error(StatusCode::BAD_REQUEST, e.to_string())
        })?;

    let changed = state.engine.switch_timeframe(timeframe);
    if changed {
        state.timeframe_tx.send_replace(timeframe);
        info!(timeframe = %timeframe, "timeframe changed via API");
    }

    Ok(Json(TimeframeResponse { timeframe, changed }))
}
