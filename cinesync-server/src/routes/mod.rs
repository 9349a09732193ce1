//! Route modules, one file per endpoint family (§6). Each family builds its
//! own sub-`Router<AppState>`, nested or merged into the top-level router
//! in `main.rs`.

pub mod auth;
pub mod database;
pub mod file_operations;
pub mod files;
pub mod jobs;
pub mod source_files;
pub mod spoof;
pub mod stats;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// `/api/*` (§6): dashboard, file-browser, scanner, job, and database
/// control APIs, gated by `auth::bearer_auth_middleware` when
/// `config.auth_enabled` is set.
pub fn api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/auth/enabled", get(auth::enabled))
        .route("/auth/login", post(auth::login))
        .route("/files", get(files::list))
        .route("/readlink", post(files::readlink))
        .route("/stats", get(stats::get_stats))
        .route("/dashboard/events", get(stats::events))
        .route("/file-operations", get(file_operations::list).post(file_operations::create))
        .route("/file-operations/events", get(file_operations::events))
        .route("/database/search", get(database::search))
        .route("/database/export", get(database::export))
        .route("/source-files", get(source_files::list).post(source_files::action))
        .route("/source-files/scans", get(source_files::scans))
        .route("/jobs", get(jobs::list).post(jobs::create))
        .route("/jobs/events", get(jobs::events))
        .route("/jobs/:id", get(jobs::get).put(jobs::update).delete(jobs::delete))
        .route("/jobs/:id/run", post(jobs::run))
        .route("/jobs/:id/cancel", post(jobs::cancel))
        .route("/jobs/:id/executions", get(jobs::executions))
        .layer(middleware::from_fn_with_state(state, crate::auth::bearer_auth_middleware))
}

/// `/api/v3/*`, `/api/v1/applications*`, `/torznab/*` (§6): the
/// Radarr/Sonarr/Prowlarr-compatible spoof surface, always gated by the
/// spoof API key regardless of `config.auth_enabled`.
pub fn spoof_router(state: AppState) -> Router<AppState> {
    let v3 = Router::new()
        .route("/system/status", get(spoof::system_status))
        .route("/health", get(spoof::health))
        .route("/movie", get(spoof::movies))
        .route("/movie/:id", get(spoof::movie_by_id))
        .route("/moviefile", get(spoof::moviefiles))
        .route("/moviefile/:id", get(spoof::moviefile_by_id))
        .route("/series", get(spoof::series))
        .route("/series/:id", get(spoof::series_by_id))
        .route("/episode", get(spoof::episodes))
        .route("/episodefile", get(spoof::episode_files))
        .route("/qualityprofile", get(spoof::quality_profiles))
        .route("/language", get(spoof::languages))
        .route("/languageprofile", get(spoof::language_profiles))
        .route("/rootfolder", get(spoof::root_folders))
        .route("/tag", get(spoof::tags))
        .route("/indexer", get(spoof::indexers))
        .route("/indexer/schema", get(spoof::indexer_schema))
        .route("/indexer/test", post(spoof::indexer_test))
        .route("/command", post(spoof::command))
        .route("/filesystem", get(spoof::filesystem))
        .route("/MediaCover/:tmdb_id/:filename", get(spoof::media_cover));

    let v1 = Router::new()
        .route("/applications", get(spoof::applications))
        .route("/applications/test", post(spoof::applications_test));

    let torznab = Router::new().route("/:slug/api", get(spoof::torznab));

    Router::new()
        .nest("/api/v3", v3)
        .nest("/api/v1", v1)
        .nest("/torznab", torznab)
        .layer(middleware::from_fn_with_state(state, crate::auth::spoof_key_middleware))
}

/// `/signalr/messages[/negotiate]` (§6, §4.4).
pub fn signalr_router() -> Router<AppState> {
    Router::new()
        .route("/messages/negotiate", post(crate::signalr::negotiate))
        .route("/messages", get(crate::signalr::messages))
}
