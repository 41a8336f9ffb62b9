//! HTTP surface
//!
//! Read-only view over the engine: rankings, per-word lookups, serialized
//! counter snapshots, and the chunk fan-out used by database sidecars. Bad
//! query parameters come back as 400 with a JSON error body; serialization
//! failures as 500 with the same shape.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};

use crate::diff::WordDiff;
use crate::engine::Engine;
use crate::ranker;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

impl AppState {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/words/top", get(top_words))
        .route("/api/words/unique_count", get(unique_count))
        .route("/api/word", get(word_count))
        .route("/api/snapshot", get(snapshot))
        .route("/api/chunks/last", get(last_chunk))
        .route("/api/chunks/stream", get(chunk_stream))
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn start(bind_addr: &str, state: AppState) -> anyhow::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("HTTP server listening on {}", bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}

fn api_error(code: StatusCode, message: impl Into<String>) -> Response {
    (
        code,
        Json(json!({
            "status": "error",
            "code": code.as_u16(),
            "message": message.into(),
        })),
    )
        .into_response()
}

fn octet_response(bytes: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "application/octet-stream")], bytes).into_response()
}

/// Pick the counter addressed by a `period` query parameter; `focus` when
/// absent.
fn select_period<'a>(
    engine: &'a Engine,
    period: Option<&str>,
) -> Result<&'a WordDiff, Response> {
    match period {
        None | Some("focus") => Ok(engine.focus()),
        Some("long") => Ok(engine.long()),
        Some(_) => Err(api_error(
            StatusCode::BAD_REQUEST,
            "Period parameter must be either 'focus' or 'long'.",
        )),
    }
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "module": "trendwords",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Deserialize)]
struct TopParams {
    limit: Option<String>,
}

/// Top emerging words, highest score first. The default limit is served
/// straight from the ranker's cache; any other limit runs a fresh pass.
async fn top_words(
    State(state): State<AppState>,
    Query(params): Query<TopParams>,
) -> Response {
    let limit = match params.limit.as_deref() {
        None => ranker::TOP_CACHE_SIZE,
        Some(raw) => match raw.parse::<usize>() {
            Ok(limit) => limit,
            Err(_) => {
                return api_error(
                    StatusCode::BAD_REQUEST,
                    "Error! Limit query param must be integer.",
                )
            }
        },
    };

    let mut words = if limit == ranker::TOP_CACHE_SIZE {
        state.engine.top()
    } else {
        ranker::rank(&state.engine, limit)
    };
    // cache order is ascending; clients want the highest first
    words.reverse();
    for entry in &mut words {
        entry.translation = state.engine.translation(&entry.word);
    }

    Json(json!({
        "words": words,
        "total": state.engine.total_messages(),
    }))
    .into_response()
}

#[derive(Deserialize)]
struct UniqueCountParams {
    period: Option<String>,
    count: Option<String>,
}

/// Number of distinct words in a counter, optionally restricted to words
/// with an exact count.
async fn unique_count(
    State(state): State<AppState>,
    Query(params): Query<UniqueCountParams>,
) -> Response {
    let target = match params.count.as_deref() {
        None => None,
        Some(raw) => match raw.parse::<i64>() {
            Ok(target) => Some(target),
            Err(_) => return api_error(StatusCode::BAD_REQUEST, "count must be an int."),
        },
    };

    let diff = match select_period(&state.engine, params.period.as_deref()) {
        Ok(diff) => diff,
        Err(response) => return response,
    };

    let mut total: u64 = 0;
    diff.walk(|_, count| {
        if target.map_or(true, |t| count == t) {
            total += 1;
        }
    });

    Json(json!({ "count": total })).into_response()
}

#[derive(Deserialize)]
struct WordParams {
    word: Option<String>,
    period: Option<String>,
}

/// Count (and translation, when cached) for a single word.
async fn word_count(
    State(state): State<AppState>,
    Query(params): Query<WordParams>,
) -> Response {
    let Some(word) = params.word else {
        return api_error(
            StatusCode::BAD_REQUEST,
            "You must provide a <word> in the query string.",
        );
    };

    let diff = match select_period(&state.engine, params.period.as_deref()) {
        Ok(diff) => diff,
        Err(response) => return response,
    };

    let count = diff.get(&word);
    let translation = state.engine.translation(&word);
    let mut body = json!({ "word": word, "count": count });
    if let Some(translation) = translation {
        body["translation"] = translation.into();
    }
    Json(body).into_response()
}

#[derive(Deserialize)]
struct SnapshotParams {
    period: Option<String>,
}

/// Serialized snapshot of the focus or long counter.
async fn snapshot(
    State(state): State<AppState>,
    Query(params): Query<SnapshotParams>,
) -> Response {
    let diff = match select_period(&state.engine, params.period.as_deref()) {
        Ok(diff) => diff,
        Err(response) => return response,
    };
    match diff.serialize() {
        Ok(bytes) => octet_response(bytes),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Serialized bytes of the most recently sealed chunk.
async fn last_chunk(State(state): State<AppState>) -> Response {
    let Some(chunk) = state.engine.last_chunk() else {
        return api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Encountered error reading the latest chunk.",
        );
    };
    match chunk.serialize() {
        Ok(bytes) => octet_response(bytes),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Unbounded plain-text stream: one `update` line per chunk seal. A
/// subscriber that stops reading lags forward onto the newest signal and
/// never stalls the ingest worker.
async fn chunk_stream(State(state): State<AppState>) -> Response {
    let broadcaster = state.engine.broadcaster();
    info!(
        subscribers = broadcaster.subscriber_count() + 1,
        "chunk stream subscriber connected"
    );
    let rx = broadcaster.subscribe();
    let updates = BroadcastStream::new(rx).map(|signal| {
        if let Err(BroadcastStreamRecvError::Lagged(missed)) = &signal {
            warn!(missed, "chunk stream subscriber lagged, coalescing");
        }
        Ok::<_, Infallible>(Bytes::from_static(b"update\n"))
    });
    (
        [(header::CONTENT_TYPE, "text/plain")],
        Body::from_stream(updates),
    )
        .into_response()
}
