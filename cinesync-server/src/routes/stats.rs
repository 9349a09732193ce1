//! `/api/stats` and `/api/dashboard/events` (§6).

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::Json;
use futures_util::stream::Stream;
use std::convert::Infallible;

use cinesync_contracts::Topic;
use cinesync_core::stats::{self, DashboardStats};

use crate::error::AppResult;
use crate::state::AppState;

pub async fn get_stats(State(state): State<AppState>) -> AppResult<Json<DashboardStats>> {
    let stats = stats::dashboard_stats(&state.core.source_db, &state.core.main_db, &state.core.aux_db).await?;
    Ok(Json(stats))
}

pub async fn events(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    crate::sse::topic_stream(&state, Topic::DashboardStats)
}
