//! Route/handler library for cinesync-hub's HTTP/WS/WebDAV surface, split
//! out from the `cinesync-hub` binary so handler-level tests can build a
//! router without going through `main`.

pub mod auth;
pub mod error;
pub mod routes;
pub mod signalr;
pub mod sse;
pub mod state;
pub mod webdav;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// `/healthz` plus every route family merged under one router (§6, §10.6).
/// CORS and request tracing wrap the whole surface; per-family auth gates
/// are applied inside `routes::api_router`/`spoof_router`.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(routes::spoof::healthz))
        .merge(routes::api_router(state.clone()))
        .merge(routes::spoof_router(state.clone()))
        .merge(routes::signalr_router())
        .nest("/webdav", webdav::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
