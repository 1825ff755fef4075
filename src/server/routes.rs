use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::api::{dispatch, QueryRequest, QueryResponse};
use crate::query::CancelToken;
use crate::server::AppState;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub version: u64,
    pub verses: usize,
    pub notes: usize,
    pub themes: usize,
    pub cross_refs: usize,
    pub theme_links: usize,
}

/// One endpoint for every query operation. A request runs against the
/// snapshot acquired at entry, so a concurrent rebuild cannot change its
/// view mid-flight. Query failures come back in the envelope, not as
/// transport errors.
pub async fn post_query(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, (StatusCode, Json<ErrorResponse>)> {
    let snapshot = state.manager.acquire().ok_or((
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse { error: "no snapshot published".to_string() }),
    ))?;

    let cancel =
        CancelToken::with_deadline(Instant::now() + Duration::from_millis(state.query_deadline_ms));
    let engine = snapshot.engine();
    Ok(Json(dispatch(&engine, &request, &cancel)))
}

pub async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let snapshot = state.manager.acquire().ok_or((
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse { error: "no snapshot published".to_string() }),
    ))?;

    let stats = snapshot.graph().stats();
    Ok(Json(StatsResponse {
        version: snapshot.version(),
        verses: stats.verses,
        notes: stats.notes,
        themes: stats.themes,
        cross_refs: stats.cross_refs,
        theme_links: stats.theme_links,
    }))
}
