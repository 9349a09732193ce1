//! `/api/database/search` and `/api/database/export` (§6).

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;

use cinesync_core::database_query::{self, DatabaseSearchParams, DatabaseSearchResult};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<DatabaseSearchParams>,
) -> AppResult<Json<DatabaseSearchResult>> {
    let result = database_query::search(&state.core.main_db, &params).await?;
    Ok(Json(result))
}

/// Streams the full `processed_files` table as CSV (§6 headers: `File
/// Path, Destination Path, TMDB ID, Season Number, Reason, File Size`).
/// Built up in memory rather than as a true chunked stream — the operator
/// library this serves tops out at a few hundred thousand rows, well
/// within a single response buffer.
pub async fn export(State(state): State<AppState>) -> AppResult<Response> {
    let rows = database_query::export_all(&state.core.main_db).await?;

    let mut writer = csv::Writer::from_writer(vec![]);
    writer
        .write_record(["File Path", "Destination Path", "TMDB ID", "Season Number", "Reason", "File Size"])
        .map_err(|e| AppError::internal(e.to_string()))?;
    for row in rows {
        writer
            .write_record([
                row.file_path,
                row.destination_path.unwrap_or_default(),
                row.tmdb_id.unwrap_or_default(),
                row.season_number.map(|n| n.to_string()).unwrap_or_default(),
                row.reason.unwrap_or_default(),
                row.file_size.to_string(),
            ])
            .map_err(|e| AppError::internal(e.to_string()))?;
    }
    let body = writer.into_inner().map_err(|e| AppError::internal(e.to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"database-export.csv\""),
        ],
        body,
    )
        .into_response())
}
