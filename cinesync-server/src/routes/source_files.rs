//! `/api/source-files[/scans]` (§6).

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use cinesync_core::source_files_query::{self, SourceFileListParams, SourceFileListResult, UpdateStatusRequest};
use cinesync_model::scan::{ScanType, SourceScanRecord};

use crate::error::AppResult;
use crate::state::AppState;

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<SourceFileListParams>,
) -> AppResult<Json<SourceFileListResult>> {
    let result = source_files_query::list_source_files(&state.core.source_db, &params).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct ScansQuery {
    #[serde(default = "default_scan_limit")]
    pub limit: i64,
}

fn default_scan_limit() -> i64 {
    20
}

pub async fn scans(
    State(state): State<AppState>,
    Query(query): Query<ScansQuery>,
) -> AppResult<Json<Vec<SourceScanRecord>>> {
    let scans = source_files_query::list_scans(&state.core.source_db, query.limit).await?;
    Ok(Json(scans))
}

/// `POST /api/source-files` (§6): a tagged-union body dispatching to either
/// `{action:"scan"}` or `{action:"update_status",files:[...]}`.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SourceFilesAction {
    Scan,
    UpdateStatus(UpdateStatusRequest),
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ActionResponse {
    Scan { total_files: i64, files_discovered: i64, files_updated: i64, files_removed: i64 },
    UpdateStatus { updated: u64 },
}

pub async fn action(State(state): State<AppState>, Json(body): Json<SourceFilesAction>) -> AppResult<Json<ActionResponse>> {
    match body {
        SourceFilesAction::Scan => {
            let counters = state.core.scanner.run_scan(ScanType::Manual).await?;
            Ok(Json(ActionResponse::Scan {
                total_files: counters.total_files,
                files_discovered: counters.files_discovered,
                files_updated: counters.files_updated,
                files_removed: counters.files_removed,
            }))
        }
        SourceFilesAction::UpdateStatus(req) => {
            let updated = source_files_query::update_status(&state.core.source_db, req).await?;
            Ok(Json(ActionResponse::UpdateStatus { updated }))
        }
    }
}
