//! Authentication (§6): two independent gates. The standard `/api/*`
//! surface is bearer-token gated, on or off per `config.auth_enabled`
//! (mode a/b). The spoofed `/api/v3/*`, `/api/v1/applications*` and
//! `/torznab/*` surface is always gated by the spoof API key, checked
//! separately via the folder-mode mapping lookup §4.5 needs.

use axum::extract::{Query, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::state::{AppState, Session};

/// The wire shape scenario 1 of the authentication walkthrough requires:
/// `401 {"error":"Unauthorized"}`, a bare string rather than the
/// `{"error":{"message","status"}}` envelope `AppError` produces elsewhere.
fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Unauthorized" }))).into_response()
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
    iat: i64,
}

fn signing_key(state: &AppState) -> String {
    // The configured spoof API key doubles as the JWT signing secret —
    // there is no separate secret in `config.yml` (§6 Configuration lists
    // none), and it is already required to be present and kept private.
    state.config.api_key.clone()
}

/// Issue a bearer token for `username`, valid 24 hours, and register the
/// session so logout/introspection can find it.
pub fn issue_token(state: &AppState, username: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let exp = now + Duration::hours(24);
    let claims = Claims {
        sub: username.to_string(),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(signing_key(state).as_bytes()))?;
    state.sessions.insert(
        token.clone(),
        Session { username: username.to_string(), issued_at: now },
    );
    Ok(token)
}

fn validate_token(state: &AppState, token: &str) -> bool {
    decode::<Claims>(token, &DecodingKey::from_secret(signing_key(state).as_bytes()), &Validation::default()).is_ok()
}

fn bearer_from_header(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

/// Bearer-token middleware for the standard `/api/*` surface (§6 mode b).
/// Disabled entirely when `config.auth_enabled` is false, and always
/// skipped for the configured allow-list (`/api/auth/enabled`,
/// `/api/auth/login` by default). SSE/WS routes carry the token as
/// `?token=` instead of a header, since browsers can't set headers on
/// `EventSource`/`WebSocket` connections.
pub async fn bearer_auth_middleware(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.auth_enabled {
        return next.run(request).await;
    }
    if state.config.bypasses_auth(request.uri().path()) {
        return next.run(request).await;
    }

    let Some(token) = bearer_from_header(&request).or(query.token) else {
        return unauthorized();
    };
    if !validate_token(&state, &token) {
        return unauthorized();
    }

    next.run(request).await
}

pub fn spoof_key_from_request(request: &Request) -> Option<String> {
    if let Some(header) = request.headers().get("X-Api-Key").and_then(|v| v.to_str().ok()) {
        return Some(header.to_string());
    }
    request
        .uri()
        .query()
        .and_then(|q| url_decode_query_param(q, "apikey"))
}

fn url_decode_query_param(query: &str, name: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        if k == name {
            Some(v.replace('+', " "))
        } else {
            None
        }
    })
}

/// API-key middleware for the Radarr/Sonarr/Prowlarr-compatible spoof
/// surface (§6 Authentication, spoofed endpoints). Unconditional — there is
/// no "disabled" mode for this half of the surface, matching the real
/// services it imitates. In folder mode, the resolved `FolderMapping` is
/// inserted as a request extension so downstream handlers can scope their
/// queries without re-deriving the key (§4.5 folder mode).
pub async fn spoof_key_middleware(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let Some(key) = spoof_key_from_request(&request) else {
        return unauthorized();
    };
    if !state.config.spoof_key_is_valid(&key) {
        tracing::warn!("spoof request rejected: unknown api key");
        tracing::debug!(mappings = ?state.config.folder_mappings, "configured folder mappings");
        return unauthorized();
    }
    if let Some(mapping) = state.config.folder_mapping_for_key(&key) {
        request.extensions_mut().insert(mapping.clone());
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinesync_config::Config;
    use cinesync_core::AppCore;
    use uuid::Uuid;

    async fn test_state() -> (tempfile::TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let core = AppCore::open(dir.path(), vec![], 8).await.unwrap();
        let config = Config {
            enabled: true,
            version: "5.14.0.9383".into(),
            branch: "master".into(),
            api_key: "a".repeat(32),
            app_guid: Uuid::nil(),
            service_type: cinesync_model::ServiceType::Auto,
            folder_mode: false,
            folder_mappings: vec![],
            library_root: "/library".into(),
            auth_enabled: true,
            auth_username: None,
            auth_password_hash: None,
            auth_bypass_paths: vec!["/api/auth/enabled".into(), "/api/auth/login".into()],
        };
        let state = AppState::new(std::sync::Arc::new(core), std::sync::Arc::new(config), dir.path().join("MediaCover"));
        (dir, state)
    }

    #[tokio::test]
    async fn issued_token_validates() {
        let (_dir, state) = test_state().await;
        let token = issue_token(&state, "admin").unwrap();
        assert!(validate_token(&state, &token));
        assert!(!validate_token(&state, "garbage"));
    }
}
