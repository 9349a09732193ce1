use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A row of DB-AUX `tmdb_entities` (§3, §4.6): the deduplicated TMDB payload
/// that one or more `tmdb_cache_keys` rows point at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbEntity {
    pub tmdb_id: i64,
    pub media_type: String,
    pub payload: serde_json::Value,
    pub poster_path: Option<String>,
    pub last_accessed: DateTime<Utc>,
}

/// A write submitted to the TMDB cache's consumer task (§4.6 write path).
#[derive(Debug, Clone)]
pub struct TmdbCacheWrite {
    pub cache_key: String,
    pub tmdb_id: i64,
    pub media_type: String,
    pub payload: serde_json::Value,
}
