//! HTTP route handlers.
//!
//! Each request owns exactly one upstream stream and one execution state;
//! nothing is shared across requests except the upstream client itself.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, Sse},
        IntoResponse, Json, Response,
    },
    routing::{get, post},
    Router,
};
use futures::{Stream, StreamExt};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::bridge::{
    collect_result, snapshots, text_fragments, ExecutionResult, ExecutionState, TextFragment,
};
use crate::config::Config;
use crate::error::BridgeError;
use crate::upstream::{UpstreamClient, UpstreamConfig};

use super::types::*;

/// Shared application state.
pub struct AppState {
    pub upstream: UpstreamClient,
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let upstream = UpstreamClient::new(
        UpstreamConfig::new(config.upstream_url.clone())
            .with_request_timeout(config.upstream_timeout),
    );
    let state = Arc::new(AppState { upstream });

    let app = Router::new()
        .route("/api/query", post(run_query))
        .route("/api/query/stream", post(stream_query))
        .route("/api/query/snapshots", post(snapshot_query))
        .route("/api/resume", post(resume))
        .route("/api/stop", post(stop))
        .route("/api/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Bridge listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn seed_thread_id(requested: Option<String>) -> String {
    requested.unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn upstream_error(e: BridgeError) -> (StatusCode, String) {
    (StatusCode::BAD_GATEWAY, e.to_string())
}

/// Submit a query and block until the full result is composed.
async fn run_query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<ExecutionResult>, (StatusCode, String)> {
    let thread_id = seed_thread_id(req.thread_id);
    let events = state
        .upstream
        .submit_query(&req.query, Some(&thread_id))
        .await
        .map_err(upstream_error)?;

    let seed = ExecutionState::new(thread_id, req.query);
    Ok(Json(collect_result(events, seed).await))
}

/// Submit a query and stream back text fragments via SSE.
async fn stream_query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, String)> {
    let thread_id = seed_thread_id(req.thread_id);
    let events = state
        .upstream
        .submit_query(&req.query, Some(&thread_id))
        .await
        .map_err(upstream_error)?;

    let seed = ExecutionState::new(thread_id, req.query);
    Ok(Sse::new(fragment_events(text_fragments(events, seed))))
}

/// Submit a query and stream back a full state snapshot per upstream event.
async fn snapshot_query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, String)> {
    let thread_id = seed_thread_id(req.thread_id);
    let events = state
        .upstream
        .submit_query(&req.query, Some(&thread_id))
        .await
        .map_err(upstream_error)?;

    let seed = ExecutionState::new(thread_id, req.query);
    let stream = snapshots(events, seed).map(|snapshot| {
        Ok(Event::default()
            .event("snapshot")
            .json_data(&snapshot)
            .unwrap())
    });
    Ok(Sse::new(stream))
}

/// Resume a paused execution with the caller's decision.
async fn resume(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResumeRequest>,
) -> Result<Response, (StatusCode, String)> {
    let events = state
        .upstream
        .resume(&req.thread_id, req.action, req.modified_value.as_deref())
        .await
        .map_err(upstream_error)?;

    // A resume continues an existing execution; the original query lives
    // upstream, so the reseeded state starts with an empty one.
    let seed = ExecutionState::new(req.thread_id, String::new());
    match req.mode {
        ResumeMode::Result => Ok(Json(collect_result(events, seed).await).into_response()),
        ResumeMode::Stream => {
            Ok(Sse::new(fragment_events(text_fragments(events, seed))).into_response())
        }
    }
}

/// Signal the upstream to stop a thread.
async fn stop(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StopRequest>,
) -> Result<Json<StopResponse>, (StatusCode, String)> {
    state
        .upstream
        .stop(&req.thread_id)
        .await
        .map_err(upstream_error)?;
    Ok(Json(StopResponse { stopped: true }))
}

/// Mirror the upstream health probe.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: state.upstream.health().await,
    })
}

fn fragment_events(
    fragments: impl Stream<Item = TextFragment>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    fragments.map(|fragment| {
        Ok(Event::default()
            .event(fragment.kind.as_str())
            .data(fragment.text))
    })
}
