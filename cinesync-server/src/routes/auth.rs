//! `/api/auth/enabled` and `/api/auth/login` (§6 Authentication). Both are
//! always on the bearer-auth bypass allow-list — a client must be able to
//! ask whether auth is enabled, and must be able to log in, before it has a
//! token to present.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct AuthEnabledResponse {
    pub enabled: bool,
}

pub async fn enabled(State(state): State<AppState>) -> Json<AuthEnabledResponse> {
    Json(AuthEnabledResponse { enabled: state.config.auth_enabled })
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user: String,
    pub pass: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

/// Verifies `user`/`pass` against the configured username and Argon2
/// password hash, then issues a bearer token (§6 mode b). Any mismatch —
/// wrong username, wrong password, or auth not configured at all — is a
/// flat 401 with no hint which part failed.
pub async fn login(State(state): State<AppState>, Json(body): Json<LoginRequest>) -> AppResult<Json<LoginResponse>> {
    let (Some(username), Some(hash)) = (state.config.auth_username.as_deref(), state.config.auth_password_hash.as_deref())
    else {
        return Err(AppError::unauthorized("authentication is not configured"));
    };

    if body.user != username || !verify_password(&body.pass, hash) {
        return Err(AppError::unauthorized("invalid credentials"));
    }

    let token = crate::auth::issue_token(&state, &body.user).map_err(|e| AppError::internal(e.to_string()))?;
    Ok(Json(LoginResponse { token }))
}

fn verify_password(candidate: &str, hash: &str) -> bool {
    use argon2::password_hash::PasswordHash;
    use argon2::{Argon2, PasswordVerifier};

    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default().verify_password(candidate.as_bytes(), &parsed).is_ok()
}
