//! Paginated reads and the one permitted external write (`update_status`)
//! against DB-SOURCE `source_files`/`source_scans` (§6 `/api/source-files*`).

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::Row;

use cinesync_model::media_type::MediaType;
use cinesync_model::processed_file::ProcessingStatus;
use cinesync_model::scan::{ScanStatus, ScanType, SourceScanRecord};
use cinesync_model::source_file::{format_size, SourceFileRecord};

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::storage::DbHandle;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceFileListParams {
    pub source_root: Option<String>,
    pub is_active: Option<bool>,
    pub processing_status: Option<ProcessingStatus>,
    pub query: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    100
}

fn row_to_source_file(row: sqlx::sqlite::SqliteRow) -> SourceFileRecord {
    let size_bytes: i64 = row.get("size_bytes");
    let size_bytes = size_bytes.max(0) as u64;
    let media_type = row
        .get::<Option<String>, _>("media_type")
        .and_then(|s| MediaType::from_str(&s).ok());
    let status_str: String = row.get("processing_status");
    let processing_status = ProcessingStatus::from_str(&status_str).unwrap_or(ProcessingStatus::Unprocessed);

    SourceFileRecord {
        file_path: row.get("file_path"),
        name: row.get("name"),
        size_bytes,
        size_formatted: format_size(size_bytes),
        modified_at: parse_ts(row.get("modified_at")),
        is_media_file: row.get::<i64, _>("is_media_file") != 0,
        media_type,
        source_index: row.get("source_index"),
        source_root: row.get("source_root"),
        directory: row.get("directory"),
        relative_path: row.get("relative_path"),
        extension: row.get("extension"),
        discovered_at: parse_ts(row.get("discovered_at")),
        last_seen_at: parse_ts(row.get("last_seen_at")),
        is_active: row.get::<i64, _>("is_active") != 0,
        processing_status,
        tmdb_id: row.get("tmdb_id"),
        season_number: row.get("season_number"),
        episode_number: row.get("episode_number"),
        last_processed_at: row.get::<Option<String>, _>("last_processed_at").map(parse_ts),
    }
}

fn parse_ts(s: String) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(|_| chrono::Utc::now())
}

fn where_clause(params: &SourceFileListParams) -> (String, Vec<String>) {
    let mut clauses = Vec::new();
    let mut binds = Vec::new();

    if let Some(root) = &params.source_root {
        clauses.push("source_root = ?".to_string());
        binds.push(root.clone());
    }
    if let Some(active) = params.is_active {
        clauses.push(format!("is_active = {}", active as i64));
    }
    if let Some(status) = params.processing_status {
        clauses.push("processing_status = ?".to_string());
        binds.push(status.as_str().to_string());
    }
    if let Some(query) = &params.query {
        if !query.is_empty() {
            clauses.push("(file_path LIKE ? OR name LIKE ?)".to_string());
            let pattern = format!("%{query}%");
            binds.push(pattern.clone());
            binds.push(pattern);
        }
    }

    if clauses.is_empty() {
        (String::new(), binds)
    } else {
        (format!("WHERE {}", clauses.join(" AND ")), binds)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceFileListResult {
    pub entries: Vec<SourceFileRecord>,
    pub total: i64,
}

/// `GET /api/source-files` (§6). Filters compose with `AND`; `query`
/// substring-matches file path or name.
pub async fn list_source_files(db: &DbHandle, params: &SourceFileListParams) -> Result<SourceFileListResult> {
    let (clause, binds) = where_clause(params);

    let mut count_query = sqlx::query(&format!("SELECT count(*) AS c FROM source_files {clause}"));
    for bind in &binds {
        count_query = count_query.bind(bind);
    }
    let total: i64 = count_query.fetch_one(db.read_pool()).await.map_err(Error::from)?.get("c");

    let mut rows_query = sqlx::query(&format!(
        "SELECT * FROM source_files {clause} ORDER BY discovered_at DESC LIMIT ? OFFSET ?"
    ));
    for bind in &binds {
        rows_query = rows_query.bind(bind);
    }
    rows_query = rows_query.bind(params.limit).bind(params.offset);

    let rows = rows_query.fetch_all(db.read_pool()).await.map_err(Error::from)?;
    let entries = rows.into_iter().map(row_to_source_file).collect();

    Ok(SourceFileListResult { entries, total })
}

/// `GET /api/source-files/scans` (§6). Most recent scans first.
pub async fn list_scans(db: &DbHandle, limit: i64) -> Result<Vec<SourceScanRecord>> {
    let rows = sqlx::query("SELECT * FROM source_scans ORDER BY started_at DESC LIMIT ?")
        .bind(limit)
        .fetch_all(db.read_pool())
        .await
        .map_err(Error::from)?;

    rows.into_iter()
        .map(|row| {
            let scan_type_str: String = row.get("scan_type");
            let status_str: String = row.get("status");
            Ok(SourceScanRecord {
                id: row.get("id"),
                source_root: row.get("source_root"),
                scan_type: scan_type_from_str(&scan_type_str)?,
                started_at: parse_ts(row.get("started_at")),
                completed_at: row.get::<Option<String>, _>("completed_at").map(parse_ts),
                status: scan_status_from_str(&status_str)?,
                files_discovered: row.get("files_discovered"),
                files_updated: row.get("files_updated"),
                files_removed: row.get("files_removed"),
                total_files: row.get("total_files"),
                duration_ms: row.get("duration_ms"),
                error_message: row.get("error_message"),
            })
        })
        .collect()
}

fn scan_type_from_str(s: &str) -> Result<ScanType> {
    match s {
        "scheduled" => Ok(ScanType::Scheduled),
        "manual" => Ok(ScanType::Manual),
        "startup" => Ok(ScanType::Startup),
        other => Err(Error::Internal(format!("unknown scan type: {other}"))),
    }
}

fn scan_status_from_str(s: &str) -> Result<ScanStatus> {
    match s {
        "running" => Ok(ScanStatus::Running),
        "completed" => Ok(ScanStatus::Completed),
        "failed" => Ok(ScanStatus::Failed),
        other => Err(Error::Internal(format!("unknown scan status: {other}"))),
    }
}

/// `POST /api/source-files` body `{"action":"update_status","files":[...]}`
/// (§6): a batched, explicit override of `processing_status` for files the
/// UI operator marks by hand, independent of the scanner's own
/// reconciliation pass (§4.2 step 6).
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    pub files: Vec<UpdateStatusEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusEntry {
    pub file_path: String,
    pub processing_status: ProcessingStatus,
}

/// Applies each entry as its own write (never rolled into a single
/// transaction): one bad path in a large batch shouldn't block the rest
/// from landing, matching the scanner's own per-batch tolerance for
/// partial progress (§4.2).
pub async fn update_status(db: &DbHandle, req: UpdateStatusRequest) -> Result<u64> {
    let mut updated = 0u64;
    for entry in req.files {
        let file_path = entry.file_path;
        let status = entry.processing_status;
        let rows = db
            .write_sync("update_source_file_status", RetryPolicy::DEFAULT, move |conn| {
                let file_path = file_path.clone();
                async move {
                    sqlx::query("UPDATE source_files SET processing_status = ? WHERE file_path = ?")
                        .bind(status.as_str())
                        .bind(&file_path)
                        .execute(&mut *conn)
                        .await
                        .map(|r| r.rows_affected())
                }
            })
            .await?;
        updated += rows;
    }
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::HandleConfig;

    async fn test_db() -> (tempfile::TempDir, DbHandle) {
        let dir = tempfile::tempdir().unwrap();
        let db = DbHandle::open("source", &dir.path().join("source.db"), HandleConfig::SOURCE).await.unwrap();
        (dir, db)
    }

    async fn seed(db: &DbHandle) {
        db.write_sync("seed", RetryPolicy::DEFAULT, |conn| async move {
            sqlx::query(
                "INSERT INTO source_files (file_path, name, size_bytes, modified_at, is_media_file, media_type, \
                 source_index, source_root, directory, relative_path, extension, discovered_at, last_seen_at, is_active, processing_status) \
                 VALUES ('/root/a.mkv', 'a.mkv', 100, '2026-01-01T00:00:00Z', 1, 'movie', 0, '/root', '/root', 'a.mkv', 'mkv', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z', 1, 'unprocessed')",
            )
            .execute(&mut *conn)
            .await
            .map(|_| ())
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn lists_and_counts() {
        let (_dir, db) = test_db().await;
        seed(&db).await;

        let params = SourceFileListParams { query: Some("a.mkv".into()), ..Default::default() };
        let result = list_source_files(&db, &params).await.unwrap();
        assert_eq!(result.total, 1);
        assert_eq!(result.entries[0].name, "a.mkv");
    }

    #[tokio::test]
    async fn update_status_changes_row() {
        let (_dir, db) = test_db().await;
        seed(&db).await;

        let req = UpdateStatusRequest {
            files: vec![UpdateStatusEntry {
                file_path: "/root/a.mkv".into(),
                processing_status: ProcessingStatus::Skipped,
            }],
        };
        let updated = update_status(&db, req).await.unwrap();
        assert_eq!(updated, 1);

        let params = SourceFileListParams::default();
        let result = list_source_files(&db, &params).await.unwrap();
        assert_eq!(result.entries[0].processing_status, ProcessingStatus::Skipped);
    }
}
