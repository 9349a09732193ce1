//! Recent-activity list (§3 DB-AUX `recent_media`): deduplicated on insert
//! by `(tmdb_id, media_type[, season, episode])`, retained up to a soft cap
//! of 100 rows. Grounded on `tmdb_cache`'s delete-then-insert dedup idiom
//! (§4.6 write path) rather than a unique index, since SQLite treats two
//! `NULL` season/episode values as distinct and a unique index would not
//! actually enforce "at most one row per identity" for movies.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::Row;

use crate::error::Result;
use crate::retry::RetryPolicy;
use crate::storage::DbHandle;

const SOFT_CAP: i64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentMediaEntry {
    pub tmdb_id: i64,
    pub media_type: String,
    pub season_number: Option<i64>,
    pub episode_number: Option<i64>,
    pub added_at: chrono::DateTime<Utc>,
}

/// Record a recent-activity row for `(tmdb_id, media_type, season, episode)`
/// (§3 "most recent insert wins"): remove the prior row with the same
/// identity, insert the new one, then trim to the soft cap by `added_at`
/// ascending.
pub async fn record(
    db: &DbHandle,
    tmdb_id: i64,
    media_type: &str,
    season_number: Option<i64>,
    episode_number: Option<i64>,
) -> Result<()> {
    let media_type = media_type.to_string();
    db.write_sync("recent_media_record", RetryPolicy::DEFAULT, move |conn| {
        let media_type = media_type.clone();
        async move {
            sqlx::query(
                "DELETE FROM recent_media WHERE tmdb_id = ? AND media_type = ? \
                 AND season_number IS ? AND episode_number IS ?",
            )
            .bind(tmdb_id)
            .bind(&media_type)
            .bind(season_number)
            .bind(episode_number)
            .execute(&mut *conn)
            .await?;

            sqlx::query(
                "INSERT INTO recent_media (tmdb_id, media_type, season_number, episode_number, added_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(tmdb_id)
            .bind(&media_type)
            .bind(season_number)
            .bind(episode_number)
            .bind(Utc::now().to_rfc3339())
            .execute(&mut *conn)
            .await?;

            sqlx::query(
                "DELETE FROM recent_media WHERE id NOT IN (SELECT id FROM recent_media ORDER BY added_at DESC LIMIT ?)",
            )
            .bind(SOFT_CAP)
            .execute(&mut *conn)
            .await
            .map(|_| ())
        }
    })
    .await
}

/// `list(limit)`: most-recently-added first, capped at the soft cap
/// regardless of the requested limit.
pub async fn list(db: &DbHandle, limit: i64) -> Result<Vec<RecentMediaEntry>> {
    let limit = limit.clamp(1, SOFT_CAP);
    let rows = sqlx::query(
        "SELECT tmdb_id, media_type, season_number, episode_number, added_at FROM recent_media ORDER BY added_at DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(db.read_pool())
    .await
    .map_err(crate::error::Error::from)?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let added_at: String = row.get("added_at");
            RecentMediaEntry {
                tmdb_id: row.get("tmdb_id"),
                media_type: row.get("media_type"),
                season_number: row.get("season_number"),
                episode_number: row.get("episode_number"),
                added_at: chrono::DateTime::parse_from_rfc3339(&added_at)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::HandleConfig;

    async fn test_db() -> (tempfile::TempDir, DbHandle) {
        let dir = tempfile::tempdir().unwrap();
        let db = DbHandle::open("aux", &dir.path().join("aux.db"), HandleConfig::AUX).await.unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn reinserting_the_same_identity_does_not_duplicate() {
        let (_dir, db) = test_db().await;
        record(&db, 603, "movie", None, None).await.unwrap();
        record(&db, 603, "movie", None, None).await.unwrap();
        let entries = list(&db, 100).await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn distinct_episodes_of_the_same_series_both_survive() {
        let (_dir, db) = test_db().await;
        record(&db, 1, "tv", Some(1), Some(1)).await.unwrap();
        record(&db, 1, "tv", Some(1), Some(2)).await.unwrap();
        let entries = list(&db, 100).await.unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn trims_to_soft_cap() {
        let (_dir, db) = test_db().await;
        for i in 0..120 {
            record(&db, i, "movie", None, None).await.unwrap();
        }
        let entries = list(&db, 1000).await.unwrap();
        assert_eq!(entries.len(), SOFT_CAP as usize);
    }
}
