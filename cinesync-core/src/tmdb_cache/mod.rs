//! TMDB cache (§4.6): deduplicates TMDB lookups across cache keys that
//! resolve to the same `(tmdb_id, media_type)` entity, backed by DB-AUX.
//! The bounded producer/single-consumer channel mirrors the write-queue
//! shape of `storage::handle`, generalized here to a dedicated short-lived
//! connection per write (§4.6: "sidestep coarse-grained lock contention
//! with the main cache reader").

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::storage::DbHandle;

const EVICTION_THRESHOLD: i64 = 5000;
const EVICTION_FRACTION: f64 = 0.20;
const EVICTION_MIN: i64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbCacheWrite {
    pub cache_key: String,
    pub tmdb_id: i64,
    pub media_type: String,
    pub payload: serde_json::Value,
}

#[derive(Clone)]
pub struct TmdbCacheHandle {
    tx: mpsc::Sender<TmdbCacheWrite>,
}

impl TmdbCacheHandle {
    /// Spawn the single consumer task draining a 100-capacity channel
    /// (§4.6 Write path) and return a cheap-to-clone handle for producers.
    pub fn spawn(db: DbHandle) -> Self {
        let (tx, rx) = mpsc::channel(100);
        tokio::spawn(run_consumer(db, rx));
        TmdbCacheHandle { tx }
    }

    pub async fn submit(&self, write: TmdbCacheWrite) {
        if self.tx.send(write).await.is_err() {
            error!("tmdb cache consumer has shut down, dropping write");
        }
    }
}

async fn run_consumer(db: DbHandle, mut rx: mpsc::Receiver<TmdbCacheWrite>) {
    info!("tmdb cache consumer started");
    while let Some(write) = rx.recv().await {
        if let Err(e) = apply_write(&db, &write).await {
            error!(cache_key = %write.cache_key, "tmdb cache write failed after retries: {e}");
        }
    }
    info!("tmdb cache consumer stopped");
}

async fn apply_write(db: &DbHandle, write: &TmdbCacheWrite) -> Result<()> {
    let write = write.clone();
    db.write_sync("tmdb_cache_upsert", RetryPolicy::TMDB_CACHE, move |conn| {
        let write = write.clone();
        async move {
            let existing = sqlx::query("SELECT tmdb_id, media_type FROM tmdb_cache_keys WHERE cache_key = ?")
                .bind(&write.cache_key)
                .fetch_optional(&mut *conn)
                .await?;
            if let Some(row) = existing {
                let existing_tmdb_id: i64 = row.get("tmdb_id");
                let existing_media_type: String = row.get("media_type");
                if existing_tmdb_id != write.tmdb_id || existing_media_type != write.media_type {
                    sqlx::query("DELETE FROM tmdb_cache_keys WHERE cache_key = ?")
                        .bind(&write.cache_key)
                        .execute(&mut *conn)
                        .await?;
                }
            }

            let now = Utc::now().to_rfc3339();
            sqlx::query(
                "INSERT INTO tmdb_entities (tmdb_id, media_type, payload, poster_path, last_accessed) VALUES (?, ?, ?, ?, ?) \
                 ON CONFLICT(tmdb_id, media_type) DO UPDATE SET payload = excluded.payload, last_accessed = excluded.last_accessed",
            )
            .bind(write.tmdb_id)
            .bind(&write.media_type)
            .bind(write.payload.to_string())
            .bind(write.payload.get("poster_path").and_then(|v| v.as_str()))
            .bind(&now)
            .execute(&mut *conn)
            .await?;

            sqlx::query(
                "INSERT INTO tmdb_cache_keys (cache_key, tmdb_id, media_type, last_accessed) VALUES (?, ?, ?, ?) \
                 ON CONFLICT(cache_key) DO UPDATE SET last_accessed = excluded.last_accessed",
            )
            .bind(&write.cache_key)
            .bind(write.tmdb_id)
            .bind(&write.media_type)
            .bind(&now)
            .execute(&mut *conn)
            .await?;

            Ok(())
        }
    })
    .await?;

    if let Err(e) = crate::recent_media::record(db, write.tmdb_id, &write.media_type, None, None).await {
        warn!(tmdb_id = write.tmdb_id, "recent_media record failed: {e}");
    }

    evict_if_needed(db).await
}

/// After a successful commit, evict the oldest 20% (min 100) of cache keys
/// once the total exceeds 5,000, then sweep orphaned entities (§4.6
/// Eviction).
async fn evict_if_needed(db: &DbHandle) -> Result<()> {
    let total: i64 = sqlx::query("SELECT count(*) AS c FROM tmdb_cache_keys")
        .fetch_one(db.read_pool())
        .await
        .map_err(Error::from)?
        .get("c");

    if total <= EVICTION_THRESHOLD {
        return Ok(());
    }

    let to_evict = ((total as f64) * EVICTION_FRACTION).round() as i64;
    let to_evict = to_evict.max(EVICTION_MIN).min(total);

    db.write_sync("tmdb_cache_eviction", RetryPolicy::TMDB_CACHE, move |conn| async move {
        sqlx::query(
            "DELETE FROM tmdb_cache_keys WHERE cache_key IN (SELECT cache_key FROM tmdb_cache_keys ORDER BY last_accessed ASC LIMIT ?)",
        )
        .bind(to_evict)
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            "DELETE FROM tmdb_entities WHERE NOT EXISTS (SELECT 1 FROM tmdb_cache_keys k WHERE k.tmdb_id = tmdb_entities.tmdb_id AND k.media_type = tmdb_entities.media_type)",
        )
        .execute(&mut *conn)
        .await
        .map(|_| ())
    })
    .await?;

    warn!(evicted = to_evict, total, "tmdb cache eviction ran");
    Ok(())
}

/// Read path (§4.6): lookup by cache key joins keys -> entities.
pub async fn lookup_by_cache_key(db: &DbHandle, cache_key: &str) -> Result<Option<serde_json::Value>> {
    let row = sqlx::query(
        "SELECT e.payload FROM tmdb_cache_keys k JOIN tmdb_entities e ON e.tmdb_id = k.tmdb_id AND e.media_type = k.media_type WHERE k.cache_key = ?",
    )
    .bind(cache_key)
    .fetch_optional(db.read_pool())
    .await
    .map_err(Error::from)?;

    Ok(row.map(|r| {
        let payload: String = r.get("payload");
        serde_json::from_str(&payload).unwrap_or(serde_json::Value::Null)
    }))
}

/// Read path (§4.6): lookup by `(tmdb_id, media_type)` reads entities
/// directly, bypassing the key table.
pub async fn lookup_by_entity(db: &DbHandle, tmdb_id: i64, media_type: &str) -> Result<Option<serde_json::Value>> {
    let row = sqlx::query("SELECT payload FROM tmdb_entities WHERE tmdb_id = ? AND media_type = ?")
        .bind(tmdb_id)
        .bind(media_type)
        .fetch_optional(db.read_pool())
        .await
        .map_err(Error::from)?;

    Ok(row.map(|r| {
        let payload: String = r.get("payload");
        serde_json::from_str(&payload).unwrap_or(serde_json::Value::Null)
    }))
}

pub type SharedTmdbCache = Arc<TmdbCacheHandle>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::HandleConfig;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let db = DbHandle::open("aux", &dir.path().join("aux.db"), HandleConfig::AUX).await.unwrap();
        let handle = TmdbCacheHandle::spawn(db.clone());

        handle
            .submit(TmdbCacheWrite {
                cache_key: "movie:603".into(),
                tmdb_id: 603,
                media_type: "movie".into(),
                payload: serde_json::json!({"title": "The Matrix", "poster_path": "/p.jpg"}),
            })
            .await;

        // Give the single consumer a beat to drain the channel.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let found = lookup_by_cache_key(&db, "movie:603").await.unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap()["title"], "The Matrix");

        let by_entity = lookup_by_entity(&db, 603, "movie").await.unwrap();
        assert!(by_entity.is_some());
    }
}
