//! Aggregate counters for the UI dashboard (§6 `/api/stats`). Reads across
//! all three databases; never writes.

use serde::Serialize;
use sqlx::Row;

use crate::error::{Error, Result};
use crate::recent_media::{self, RecentMediaEntry};
use crate::storage::DbHandle;

#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardStats {
    pub total_source_files: i64,
    pub active_source_files: i64,
    pub media_files: i64,
    pub total_processed: i64,
    pub total_movies: i64,
    pub total_series: i64,
    pub total_jobs: i64,
    pub running_jobs: i64,
    pub last_scan_completed_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Most-recently-synced TMDB entities (§2, §3 `recent_media`), newest
    /// first, capped at 10 for the dashboard widget.
    pub recent_media: Vec<RecentMediaEntry>,
}

async fn count(db: &DbHandle, sql: &str) -> Result<i64> {
    Ok(sqlx::query(sql).fetch_one(db.read_pool()).await.map_err(Error::from)?.get::<i64, _>("c"))
}

pub async fn dashboard_stats(source_db: &DbHandle, main_db: &DbHandle, aux_db: &DbHandle) -> Result<DashboardStats> {
    let total_source_files = count(source_db, "SELECT count(*) AS c FROM source_files").await?;
    let active_source_files = count(source_db, "SELECT count(*) AS c FROM source_files WHERE is_active = 1").await?;
    let media_files = count(source_db, "SELECT count(*) AS c FROM source_files WHERE is_media_file = 1").await?;

    let total_processed = match count(main_db, "SELECT count(*) AS c FROM processed_files").await {
        Ok(n) => n,
        Err(e) if e.is_missing_table() => 0,
        Err(e) => return Err(e),
    };
    let total_movies = match count(
        main_db,
        "SELECT count(DISTINCT tmdb_id) AS c FROM processed_files WHERE season_number IS NULL",
    )
    .await
    {
        Ok(n) => n,
        Err(e) if e.is_missing_table() => 0,
        Err(e) => return Err(e),
    };
    let total_series = match count(
        main_db,
        "SELECT count(DISTINCT tmdb_id) AS c FROM processed_files WHERE season_number IS NOT NULL",
    )
    .await
    {
        Ok(n) => n,
        Err(e) if e.is_missing_table() => 0,
        Err(e) => return Err(e),
    };
    let total_jobs = match count(main_db, "SELECT count(*) AS c FROM jobs").await {
        Ok(n) => n,
        Err(e) if e.is_missing_table() => 0,
        Err(e) => return Err(e),
    };
    let running_jobs = match count(main_db, "SELECT count(*) AS c FROM jobs WHERE status = 'running'").await {
        Ok(n) => n,
        Err(e) if e.is_missing_table() => 0,
        Err(e) => return Err(e),
    };

    let last_scan_completed_at = sqlx::query(
        "SELECT completed_at FROM source_scans WHERE status = 'completed' ORDER BY completed_at DESC LIMIT 1",
    )
    .fetch_optional(source_db.read_pool())
    .await
    .map_err(Error::from)?
    .and_then(|row| row.get::<Option<String>, _>("completed_at"))
    .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
    .map(|dt| dt.with_timezone(&chrono::Utc));

    let recent_media = match recent_media::list(aux_db, 10).await {
        Ok(entries) => entries,
        Err(e) if e.is_missing_table() => Vec::new(),
        Err(e) => return Err(e),
    };

    Ok(DashboardStats {
        total_source_files,
        active_source_files,
        media_files,
        total_processed,
        total_movies,
        total_series,
        total_jobs,
        running_jobs,
        last_scan_completed_at,
        recent_media,
    })
}
