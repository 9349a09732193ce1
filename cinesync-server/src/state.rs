//! Shared application state handed to every handler (§9 "Global mutable
//! state" — one explicit value via axum's `State` extractor, not a
//! package-level singleton).

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use cinesync_config::Config;
use cinesync_core::AppCore;

/// A live bearer-token session (§6 Authentication, mode b).
#[derive(Debug, Clone)]
pub struct Session {
    pub username: String,
    pub issued_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Clone)]
pub struct AppState {
    pub core: Arc<AppCore>,
    pub config: Arc<Config>,
    /// Bearer tokens issued by `/api/auth/login`, held in memory only —
    /// restarting the process invalidates every session, matching the
    /// teacher's admin-session cleanup idiom rather than a persisted store.
    pub sessions: Arc<DashMap<String, Session>>,
    /// `../db/MediaCover/<tmdbId>/{poster,fanart}.jpg` (§6 persisted state
    /// layout) — not part of `config.yml`, derived from the working
    /// directory at boot.
    pub media_cover_dir: PathBuf,
    /// Process start time, for `/api/v3/system/status`'s `startTime` field.
    pub started_at: DateTime<Utc>,
    /// In-memory WebDAV lock table (§6 `/webdav/*`), keyed by the locked
    /// path. Locks do not survive a restart — RFC 4918 treats that as a
    /// valid outcome of the lock holder losing its session.
    pub webdav_locks: Arc<DashMap<String, crate::webdav::LockEntry>>,
}

impl AppState {
    pub fn new(core: Arc<AppCore>, config: Arc<Config>, media_cover_dir: PathBuf) -> Self {
        AppState {
            core,
            config,
            sessions: Arc::new(DashMap::new()),
            media_cover_dir,
            started_at: Utc::now(),
            webdav_locks: Arc::new(DashMap::new()),
        }
    }
}
