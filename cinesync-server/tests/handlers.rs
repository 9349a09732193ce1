//! Handler-level tests driving the real router through `axum-test`, rather
//! than calling handler functions directly (§8 scenario walkthroughs).

use std::sync::Arc;

use axum_test::TestServer;
use cinesync_config::Config;
use cinesync_core::AppCore;
use cinesync_model::{FolderMapping, ServiceType};
use cinesync_server::state::AppState;
use uuid::Uuid;

const API_KEY: &str = "abcdef0123456789abcdef0123456789";

async fn test_server(config: Config) -> (tempfile::TempDir, TestServer) {
    let dir = tempfile::tempdir().unwrap();
    let core = AppCore::open(dir.path(), vec![], 8).await.unwrap();
    let state = AppState::new(Arc::new(core), Arc::new(config), dir.path().join("MediaCover"));
    let app = cinesync_server::create_app(state);
    (dir, TestServer::new(app).unwrap())
}

fn base_config() -> Config {
    Config {
        enabled: true,
        version: "5.14.0.9383".into(),
        branch: "master".into(),
        api_key: API_KEY.to_string(),
        app_guid: Uuid::nil(),
        service_type: ServiceType::Auto,
        folder_mode: false,
        folder_mappings: vec![],
        library_root: "/library".into(),
        auth_enabled: false,
        auth_username: None,
        auth_password_hash: None,
        auth_bypass_paths: vec!["/api/auth/enabled".into(), "/api/auth/login".into()],
    }
}

#[tokio::test]
async fn healthz_is_unauthenticated() {
    let (_dir, server) = test_server(base_config()).await;
    let response = server.get("/healthz").await;
    response.assert_status_ok();
}

#[tokio::test]
async fn spoof_surface_rejects_missing_api_key_with_literal_body() {
    let (_dir, server) = test_server(base_config()).await;
    let response = server.get("/api/v3/movie").await;
    response.assert_status(axum::http::StatusCode::UNAUTHORIZED);
    response.assert_json(&serde_json::json!({ "error": "Unauthorized" }));
}

#[tokio::test]
async fn spoof_surface_accepts_valid_api_key() {
    let (_dir, server) = test_server(base_config()).await;
    let response = server.get("/api/v3/system/status").add_header("X-Api-Key", API_KEY).await;
    response.assert_status_ok();
}

#[tokio::test]
async fn radarr_only_service_type_hides_series_family() {
    let mut config = base_config();
    config.service_type = ServiceType::Radarr;
    let (_dir, server) = test_server(config).await;

    let series = server.get("/api/v3/series").add_header("X-Api-Key", API_KEY).await;
    series.assert_status_ok();
    series.assert_json(&serde_json::json!([]));

    let by_id = server.get("/api/v3/series/1").add_header("X-Api-Key", API_KEY).await;
    by_id.assert_status(axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn folder_mapping_prefix_does_not_match_sibling_folder() {
    let mapping = FolderMapping {
        folder_path: "/library/Movies".into(),
        display_name: "Movies".into(),
        service_type: ServiceType::Radarr,
        api_key: "folder-key-0123456789abcdef01234567".into(),
        enabled: true,
    };
    assert!(mapping.contains("/library/Movies/Alien (1979)/alien.mkv"));
    assert!(!mapping.contains("/library/MoviesExtra/x.mkv"));
}
