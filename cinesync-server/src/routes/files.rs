//! `/api/files/*` and `/api/readlink` (§6): plain filesystem browsing of the
//! configured library root, independent of the scanner/DB layer — these
//! serve the UI's file browser, not the managed-library metadata.

use std::path::{Component, Path, PathBuf};

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct DirEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub entry_type: &'static str,
    pub size: u64,
    pub modified: chrono::DateTime<chrono::Utc>,
}

/// Resolve a UI-supplied relative path against the library root, rejecting
/// any `..` component so the browser can't escape it (§6 gives no explicit
/// traversal rule, but every sibling endpoint in this surface is
/// library-scoped).
pub(crate) fn resolve_under_root(root: &Path, relative: &str) -> AppResult<PathBuf> {
    let relative = relative.trim_start_matches('/');
    let candidate = root.join(relative);
    if Path::new(relative).components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(AppError::bad_request("path escapes library root"));
    }
    Ok(candidate)
}

pub async fn list(State(state): State<AppState>, Query(query): Query<ListQuery>) -> AppResult<Json<Vec<DirEntry>>> {
    let dir = resolve_under_root(&state.config.library_root, &query.path)?;
    let mut read_dir = tokio::fs::read_dir(&dir).await?;

    let mut entries = Vec::new();
    while let Some(entry) = read_dir.next_entry().await? {
        let metadata = entry.metadata().await?;
        let name = entry.file_name().to_string_lossy().to_string();
        let modified = metadata
            .modified()
            .map(chrono::DateTime::<chrono::Utc>::from)
            .unwrap_or_else(|_| chrono::Utc::now());
        entries.push(DirEntry {
            name,
            entry_type: if metadata.is_dir() { "directory" } else { "file" },
            size: if metadata.is_dir() { 0 } else { metadata.len() },
            modified,
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Json(entries))
}

#[derive(Debug, Deserialize)]
pub struct ReadlinkRequest {
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct ReadlinkResponse {
    pub real_path: String,
    pub abs_path: String,
}

/// Resolve a logical library path to its real (symlink-followed) target and
/// absolute form (§6 `/api/readlink`) — the organizer lays out the library
/// as symlinks, so this is how the UI shows an operator what a listing
/// entry actually points at.
pub async fn readlink(
    State(state): State<AppState>,
    Json(body): Json<ReadlinkRequest>,
) -> AppResult<Json<ReadlinkResponse>> {
    let abs_path = resolve_under_root(&state.config.library_root, &body.path)?;
    let real_path = match tokio::fs::read_link(&abs_path).await {
        Ok(target) => target,
        Err(_) => tokio::fs::canonicalize(&abs_path).await.unwrap_or_else(|_| abs_path.clone()),
    };
    Ok(Json(ReadlinkResponse {
        real_path: real_path.to_string_lossy().to_string(),
        abs_path: abs_path.to_string_lossy().to_string(),
    }))
}
