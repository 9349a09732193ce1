//! `/api/file-operations[/events]` (§6, §8 scenario 4 "broadcast fan-out").

use std::convert::Infallible;

use axum::extract::{Query, State};
use axum::response::sse::{Event, Sse};
use axum::Json;
use futures_util::stream::Stream;
use serde::{Deserialize, Serialize};

use cinesync_contracts::{BroadcastEvent, Topic};
use cinesync_core::file_ops::{self, FileOperationKind, FileOperationRecord, FileOperationRequest, StatusCounts};

use crate::error::AppResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct FileOperationsResponse {
    pub entries: Vec<FileOperationRecord>,
    pub status_counts: StatusCounts,
}

pub async fn list(State(state): State<AppState>, Query(query): Query<ListQuery>) -> AppResult<Json<FileOperationsResponse>> {
    let entries = file_ops::list_operations(&state.core.main_db, query.limit, query.offset).await?;
    let status_counts = file_ops::status_counts(&state.core.main_db).await?;
    Ok(Json(FileOperationsResponse { entries, status_counts }))
}

/// `POST /api/file-operations` (§6). `add` is broadcast-only — there is no
/// table for it, since the organizer itself owns the successful-processing
/// record in `processed_files`; this service only audits deletions and
/// failures it is told about.
pub async fn create(State(state): State<AppState>, Json(req): Json<FileOperationRequest>) -> AppResult<Json<serde_json::Value>> {
    match req.operation {
        FileOperationKind::Delete => file_ops::record_deletion(&state.core.main_db, &req).await?,
        FileOperationKind::Failed => file_ops::record_failure(&state.core.main_db, &req).await?,
        FileOperationKind::Add => {}
    }

    state.core.broadcaster.broadcast(
        Topic::FileOperation,
        BroadcastEvent::new(
            "file_operation_update",
            serde_json::json!({
                "operation": req.operation.as_str(),
                "sourcePath": req.source_path,
            }),
        ),
    );

    Ok(Json(serde_json::json!({"ok": true})))
}

pub async fn events(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    crate::sse::topic_stream(&state, Topic::FileOperation)
}
