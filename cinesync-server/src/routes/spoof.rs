//! The Radarr/Sonarr/Prowlarr-compatible spoof surface (§4.5, §6
//! `/api/v3/*`, `/api/v1/applications*`, `/torznab/*`). Every handler here
//! sits behind `auth::spoof_key_middleware`; none of it touches the
//! bearer-token gate the rest of `/api/*` uses.

use axum::extract::{Extension, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use cinesync_model::folder_mapping::FolderMapping;
use cinesync_model::ServiceType;

use crate::error::{AppError, AppResult};
use crate::routes::files::resolve_under_root;
use crate::state::AppState;

fn scope(mapping: &Option<Extension<FolderMapping>>) -> Option<&FolderMapping> {
    mapping.as_ref().map(|Extension(m)| m)
}

/// The `serviceType` that gates which endpoint family returns data: a
/// mapping's own type in folder mode, otherwise the top-level config's
/// (§4.5, §6).
fn effective_service_type(state: &AppState, mapping: &Option<Extension<FolderMapping>>) -> ServiceType {
    mapping.as_ref().map(|Extension(m)| m.service_type).unwrap_or(state.config.service_type)
}

/// Whether the movie family (`true`) or series family (`false`) is exposed
/// under `service_type`. `Auto` exposes both.
fn family_allowed(service_type: ServiceType, is_movie_family: bool) -> bool {
    match service_type {
        ServiceType::Auto => true,
        ServiceType::Radarr => is_movie_family,
        ServiceType::Sonarr => !is_movie_family,
    }
}

/// `GET /api/v3/system/status` (§10.6: every spoofed client reads this on
/// startup; a bare-minimum stub would fail the auth-bypass/spoof-identity
/// testable properties).
pub async fn system_status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "version": state.config.version,
        "branch": state.config.branch,
        "appName": "CineSync",
        "appGuid": state.config.app_guid,
        "instanceName": "CineSync",
        "startTime": state.started_at,
        "isDebug": false,
        "isProduction": true,
        "isAdmin": true,
        "isUserInteractive": false,
        "startupPath": "/app",
        "appData": "/app/db",
        "osName": std::env::consts::OS,
        "osVersion": "",
        "isNetCore": true,
        "isLinux": cfg!(target_os = "linux"),
        "isOsx": cfg!(target_os = "macos"),
        "isWindows": cfg!(target_os = "windows"),
        "mode": "console",
        "authentication": "apikey",
        "sqliteVersion": "3",
        "urlBase": "",
        "runtimeVersion": env!("CARGO_PKG_VERSION"),
        "runtimeName": "cinesync",
    }))
}

/// `GET /healthz` and `GET /api/v3/health` (§10.6 liveness probe /
/// health-issue list; an empty array means "no reported problems").
pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn health() -> Json<Vec<Value>> {
    Json(vec![])
}

pub async fn movies(State(state): State<AppState>, mapping: Option<Extension<FolderMapping>>) -> AppResult<Json<Value>> {
    if !family_allowed(effective_service_type(&state, &mapping), true) {
        return Ok(Json(Value::Array(vec![])));
    }
    let movies = state.core.spoof.list_movies(scope(&mapping)).await?;
    Ok(Json(serde_json::to_value(movies).unwrap_or_default()))
}

pub async fn movie_by_id(
    State(state): State<AppState>,
    mapping: Option<Extension<FolderMapping>>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    if !family_allowed(effective_service_type(&state, &mapping), true) {
        return Err(AppError::not_found(format!("movie {id}")));
    }
    let movies = state.core.spoof.list_movies(scope(&mapping)).await?;
    let movie = movies.into_iter().find(|m| m.id == id).ok_or_else(|| AppError::not_found(format!("movie {id}")))?;
    Ok(Json(serde_json::to_value(movie).unwrap_or_default()))
}

pub async fn moviefiles(State(state): State<AppState>, mapping: Option<Extension<FolderMapping>>) -> AppResult<Json<Value>> {
    if !family_allowed(effective_service_type(&state, &mapping), true) {
        return Ok(Json(Value::Array(vec![])));
    }
    let movies = state.core.spoof.list_movies(scope(&mapping)).await?;
    let files: Vec<_> = movies.into_iter().filter_map(|m| m.movie_file).collect();
    Ok(Json(serde_json::to_value(files).unwrap_or_default()))
}

pub async fn moviefile_by_id(
    State(state): State<AppState>,
    mapping: Option<Extension<FolderMapping>>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    if !family_allowed(effective_service_type(&state, &mapping), true) {
        return Err(AppError::not_found(format!("moviefile {id}")));
    }
    let movies = state.core.spoof.list_movies(scope(&mapping)).await?;
    let file = movies
        .into_iter()
        .find_map(|m| m.movie_file.filter(|f| f.id == id))
        .ok_or_else(|| AppError::not_found(format!("moviefile {id}")))?;
    Ok(Json(serde_json::to_value(file).unwrap_or_default()))
}

pub async fn series(State(state): State<AppState>, mapping: Option<Extension<FolderMapping>>) -> AppResult<Json<Value>> {
    if !family_allowed(effective_service_type(&state, &mapping), false) {
        return Ok(Json(Value::Array(vec![])));
    }
    let groups = state.core.spoof.list_series(scope(&mapping)).await?;
    let series: Vec<_> = groups.into_iter().map(|(s, _, _)| s).collect();
    Ok(Json(serde_json::to_value(series).unwrap_or_default()))
}

pub async fn series_by_id(
    State(state): State<AppState>,
    mapping: Option<Extension<FolderMapping>>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    if !family_allowed(effective_service_type(&state, &mapping), false) {
        return Err(AppError::not_found(format!("series {id}")));
    }
    let groups = state.core.spoof.list_series(scope(&mapping)).await?;
    let (series, _, _) = groups.into_iter().find(|(s, _, _)| s.id == id).ok_or_else(|| AppError::not_found(format!("series {id}")))?;
    Ok(Json(serde_json::to_value(series).unwrap_or_default()))
}

#[derive(Debug, Deserialize, Default)]
pub struct SeriesScopedQuery {
    #[serde(rename = "seriesId")]
    pub series_id: Option<i64>,
}

pub async fn episodes(
    State(state): State<AppState>,
    mapping: Option<Extension<FolderMapping>>,
    Query(query): Query<SeriesScopedQuery>,
) -> AppResult<Json<Value>> {
    if !family_allowed(effective_service_type(&state, &mapping), false) {
        return Ok(Json(Value::Array(vec![])));
    }
    let groups = state.core.spoof.list_series(scope(&mapping)).await?;
    let episodes: Vec<_> = groups
        .into_iter()
        .filter(|(s, _, _)| query.series_id.map(|id| id == s.id).unwrap_or(true))
        .flat_map(|(_, episodes, _)| episodes)
        .collect();
    Ok(Json(serde_json::to_value(episodes).unwrap_or_default()))
}

pub async fn episode_files(
    State(state): State<AppState>,
    mapping: Option<Extension<FolderMapping>>,
    Query(query): Query<SeriesScopedQuery>,
) -> AppResult<Json<Value>> {
    if !family_allowed(effective_service_type(&state, &mapping), false) {
        return Ok(Json(Value::Array(vec![])));
    }
    let groups = state.core.spoof.list_series(scope(&mapping)).await?;
    let files: Vec<_> = groups
        .into_iter()
        .filter(|(s, _, _)| query.series_id.map(|id| id == s.id).unwrap_or(true))
        .flat_map(|(_, _, files)| files)
        .collect();
    Ok(Json(serde_json::to_value(files).unwrap_or_default()))
}

/// `GET /api/v3/qualityprofile` — a fixed catalog matching the quality
/// tiers `cinesync_model::spoof::Quality` infers (§4.5 key derivations).
/// There is no profile-editing UI in this design; clients only need a
/// profile id to attach to a movie/series record.
pub async fn quality_profiles() -> Json<Value> {
    Json(json!([
        {"id": 1, "name": "Any", "upgradeAllowed": false, "cutoff": 1, "items": []},
        {"id": 2, "name": "HD-1080p", "upgradeAllowed": false, "cutoff": 2, "items": []},
        {"id": 3, "name": "4K-2160p", "upgradeAllowed": false, "cutoff": 3, "items": []},
    ]))
}

pub async fn languages() -> Json<Value> {
    Json(json!([{"id": 1, "name": "English", "nameLower": "english"}]))
}

pub async fn language_profiles() -> Json<Value> {
    Json(json!([{"id": 1, "name": "Any", "languages": [], "cutoff": {"id": 1, "name": "English"}}]))
}

/// `GET /api/v3/rootfolder` — the managed library root in single-service
/// mode, or the caller's own folder mapping path in folder mode (§4.5
/// Folder mode).
pub async fn root_folders(State(state): State<AppState>, mapping: Option<Extension<FolderMapping>>) -> Json<Value> {
    let path = scope(&mapping)
        .map(|m| m.folder_path.clone())
        .unwrap_or_else(|| state.config.library_root.to_string_lossy().to_string());
    Json(json!([{"id": 1, "path": path, "accessible": true, "freeSpace": 0, "unmappedFolders": []}]))
}

/// `GET /api/v3/tag` — no user-defined tagging in this design; every
/// spoofed client tolerates an empty tag catalog.
pub async fn tags() -> Json<Value> {
    Json(json!([]))
}

/// `GET /api/v3/indexer` — no indexer is actually wired up behind this
/// service; it exists purely so Prowlarr-style clients see a 200 with an
/// empty list instead of erroring out.
pub async fn indexers() -> Json<Value> {
    Json(json!([]))
}

pub async fn indexer_schema() -> Json<Value> {
    Json(json!([{
        "implementation": "Torznab",
        "implementationName": "Torznab",
        "name": "Generic Torznab",
        "protocol": "torrent",
        "supportsRss": true,
        "supportsSearch": true,
        "fields": [
            {"name": "baseUrl", "label": "URL", "type": "textbox"},
            {"name": "apiKey", "label": "API Key", "type": "textbox"},
        ],
    }]))
}

pub async fn indexer_test() -> Json<Value> {
    Json(json!({"isValid": true}))
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub name: String,
    #[serde(default)]
    pub body: Value,
}

/// `POST /api/v3/command` — most spoofed commands (`RescanMovie`,
/// `RescanSeries`, `RefreshMovie`, `RefreshSeries`) trigger a real source
/// scan; anything else is acknowledged without side effects, matching the
/// spoof surface's "read model over `processed_files`" scope (§4.5).
pub async fn command(State(state): State<AppState>, Json(req): Json<CommandRequest>) -> AppResult<Json<Value>> {
    let triggers_scan = matches!(req.name.as_str(), "RescanMovie" | "RescanSeries" | "RefreshMovie" | "RefreshSeries" | "RefreshMonitoredDownloads");
    if triggers_scan {
        state.core.scanner.run_scan(cinesync_model::scan::ScanType::Manual).await?;
    }
    let now = chrono::Utc::now();
    Ok(Json(json!({
        "id": now.timestamp_millis(),
        "name": req.name,
        "commandName": req.name,
        "body": req.body,
        "status": "completed",
        "queued": now,
        "started": now,
        "ended": now,
        "duration": "00:00:00",
        "trigger": "manual",
    })))
}

#[derive(Debug, Deserialize, Default)]
pub struct FilesystemQuery {
    #[serde(default)]
    pub path: String,
}

/// `GET /api/v3/filesystem` — the Radarr/Sonarr-shaped equivalent of
/// `/api/files`, scoped to the same library root (§6).
pub async fn filesystem(State(state): State<AppState>, Query(query): Query<FilesystemQuery>) -> AppResult<Json<Value>> {
    let dir = resolve_under_root(&state.config.library_root, &query.path)?;
    let mut read_dir = tokio::fs::read_dir(&dir).await?;

    let mut entries = Vec::new();
    while let Some(entry) = read_dir.next_entry().await? {
        let metadata = entry.metadata().await?;
        entries.push(json!({
            "name": entry.file_name().to_string_lossy(),
            "path": entry.path().to_string_lossy(),
            "type": if metadata.is_dir() { "folder" } else { "file" },
            "size": if metadata.is_dir() { 0 } else { metadata.len() },
        }));
    }
    Ok(Json(json!({"parent": query.path, "directories": entries.iter().filter(|e| e["type"] == "folder").cloned().collect::<Vec<_>>(), "files": entries.iter().filter(|e| e["type"] == "file").cloned().collect::<Vec<_>>()})))
}

/// `GET /api/v3/MediaCover/{tmdbId}/{poster|fanart}.jpg` (§4.5 Image URLs,
/// §6 persisted state layout). Serves the cached file under
/// `../db/MediaCover/<tmdbId>/` if present; otherwise resolves a fallback
/// URL via the read model and redirects to it.
pub async fn media_cover(
    State(state): State<AppState>,
    Path((tmdb_id, filename)): Path<(i64, String)>,
) -> AppResult<Response> {
    let cached = state.media_cover_dir.join(tmdb_id.to_string()).join(&filename);
    if let Ok(bytes) = tokio::fs::read(&cached).await {
        return Ok(([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response());
    }

    let media_type = state.core.spoof.media_type_for(tmdb_id).await?.unwrap_or_else(|| "movie".to_string());
    let urls = state.core.spoof.image_urls(tmdb_id, &media_type).await?;
    let kind = if filename.starts_with("fanart") { "fanart" } else { "poster" };
    let target = urls.into_iter().find(|(k, _)| k == kind).map(|(_, url)| url).unwrap_or_else(|| "/MediaCover/poster-fallback.jpg".to_string());

    Ok((StatusCode::FOUND, [(header::LOCATION, target)]).into_response())
}

#[derive(Debug, Serialize)]
pub struct ApplicationEntry {
    pub id: i64,
    pub name: String,
}

/// `/api/v1/applications[/test]` (§6). No downstream *arr applications are
/// actually registered in this design — the service is itself the spoof
/// target, not a client of one — so the list is always empty and `/test`
/// always reports success.
pub async fn applications() -> Json<Vec<ApplicationEntry>> {
    Json(vec![])
}

pub async fn applications_test() -> Json<Value> {
    Json(json!({"isValid": true}))
}

#[derive(Debug, Deserialize, Default)]
pub struct TorznabQuery {
    #[serde(rename = "t", default)]
    pub kind: String,
}

/// `GET /torznab/{slug}/api?t={caps|search}` (§6). `caps` advertises
/// search capabilities in the Torznab capability-document shape; `search`
/// returns an empty result feed, since this service is a read model over a
/// managed library, not an indexer with real torrent results.
pub async fn torznab(Path(_slug): Path<String>, Query(query): Query<TorznabQuery>) -> Response {
    let body = match query.kind.as_str() {
        "caps" => TORZNAB_CAPS.to_string(),
        _ => TORZNAB_EMPTY_FEED.to_string(),
    };
    ([(header::CONTENT_TYPE, "application/xml; charset=utf-8")], body).into_response()
}

const TORZNAB_CAPS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<caps>
  <server version="1.0" title="CineSync" strapline="" url="" />
  <limits max="100" default="50" />
  <searching>
    <search available="yes" supportedParams="q" />
    <movie-search available="yes" supportedParams="q,imdbid,tmdbid" />
    <tv-search available="yes" supportedParams="q,season,ep,tvdbid" />
  </searching>
  <categories>
    <category id="2000" name="Movies" />
    <category id="5000" name="TV" />
  </categories>
</caps>"#;

const TORZNAB_EMPTY_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:torznab="http://torznab.com/schemas/2015/feed">
  <channel>
    <title>CineSync</title>
  </channel>
</rss>"#;
