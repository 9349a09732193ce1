//! File-operation log (§6 `/api/file-operations`): auxiliary writes to
//! DB-MAIN's `file_deletions`/`file_failures` tables (§3), and the merged,
//! paginated read the dashboard polls. The service only ever appends here —
//! `processed_files` itself stays owned by the external organizer.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::Row;

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::storage::DbHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOperationKind {
    Add,
    Delete,
    Failed,
}

impl FileOperationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            FileOperationKind::Add => "add",
            FileOperationKind::Delete => "delete",
            FileOperationKind::Failed => "failed",
        }
    }
}

/// `POST /api/file-operations` body (§6).
#[derive(Debug, Clone, Deserialize)]
pub struct FileOperationRequest {
    pub operation: FileOperationKind,
    pub source_path: String,
    pub destination_path: Option<String>,
    pub tmdb_id: Option<String>,
    pub season_number: Option<i64>,
    pub reason: Option<String>,
    pub error: Option<String>,
}

/// One row of the merged operation log read back by the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct FileOperationRecord {
    pub operation: String,
    pub source_path: String,
    pub destination_path: Option<String>,
    pub tmdb_id: Option<String>,
    pub season_number: Option<i64>,
    pub reason: Option<String>,
    pub error: Option<String>,
    pub timestamp: chrono::DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusCounts {
    pub created: i64,
    pub failed: i64,
    pub skipped: i64,
    pub deleted: i64,
}

/// Record a deletion (`operation: delete`). Appends to `file_deletions`; the
/// caller (the HTTP handler) is responsible for broadcasting the
/// `file_operation_update` event afterwards (§4.4 is a pure fan-out, not a
/// persistence concern).
pub async fn record_deletion(db: &DbHandle, req: &FileOperationRequest) -> Result<()> {
    let file_path = req.source_path.clone();
    let destination_path = req.destination_path.clone();
    let tmdb_id = req.tmdb_id.clone();
    let season_number = req.season_number;
    let reason = req.reason.clone();

    db.deletion("record_file_deletion", move |conn| {
        let file_path = file_path.clone();
        let destination_path = destination_path.clone();
        let tmdb_id = tmdb_id.clone();
        let reason = reason.clone();
        async move {
            sqlx::query(
                "INSERT INTO file_deletions (file_path, destination_path, tmdb_id, season_number, reason, deleted_at) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&file_path)
            .bind(&destination_path)
            .bind(&tmdb_id)
            .bind(season_number)
            .bind(&reason)
            .bind(Utc::now().to_rfc3339())
            .execute(&mut *conn)
            .await
            .map(|_| ())
        }
    })
    .await
}

/// Record a failure (`operation: failed`). Appends to `file_failures`.
pub async fn record_failure(db: &DbHandle, req: &FileOperationRequest) -> Result<()> {
    let file_path = req.source_path.clone();
    let tmdb_id = req.tmdb_id.clone();
    let season_number = req.season_number;
    let reason = req.reason.clone();
    let error_message = req.error.clone().unwrap_or_else(|| "unknown error".to_string());

    db.write_sync("record_file_failure", RetryPolicy::DEFAULT, move |conn| {
        let file_path = file_path.clone();
        let tmdb_id = tmdb_id.clone();
        let reason = reason.clone();
        let error_message = error_message.clone();
        async move {
            sqlx::query(
                "INSERT INTO file_failures (file_path, tmdb_id, season_number, reason, failed_at, error_message) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&file_path)
            .bind(&tmdb_id)
            .bind(season_number)
            .bind(&reason)
            .bind(Utc::now().to_rfc3339())
            .bind(&error_message)
            .execute(&mut *conn)
            .await
            .map(|_| ())
        }
    })
    .await
}

/// Delete a `file_deletions` record by source path. Used to test the
/// "import then delete leaves DB-MAIN invariants unchanged" round-trip
/// (§8) and as an undo path for the UI.
pub async fn remove_deletion_record(db: &DbHandle, file_path: &str) -> Result<u64> {
    let file_path = file_path.to_string();
    db.deletion("remove_deletion_record", move |conn| {
        let file_path = file_path.clone();
        async move {
            sqlx::query("DELETE FROM file_deletions WHERE file_path = ?")
                .bind(&file_path)
                .execute(&mut *conn)
                .await
                .map(|r| r.rows_affected())
        }
    })
    .await
}

/// Merged, paginated read of the operation log across `file_deletions` and
/// `file_failures`, newest first (§6 `/api/file-operations` GET).
pub async fn list_operations(db: &DbHandle, limit: i64, offset: i64) -> Result<Vec<FileOperationRecord>> {
    let rows = sqlx::query(
        "SELECT 'delete' AS operation, file_path, destination_path, tmdb_id, season_number, reason, NULL AS error, deleted_at AS ts FROM file_deletions \
         UNION ALL \
         SELECT 'failed' AS operation, file_path, NULL AS destination_path, tmdb_id, season_number, reason, error_message AS error, failed_at AS ts FROM file_failures \
         ORDER BY ts DESC LIMIT ? OFFSET ?",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(db.read_pool())
    .await
    .map_err(Error::from)?;

    Ok(rows
        .into_iter()
        .map(|row| FileOperationRecord {
            operation: row.get("operation"),
            source_path: row.get("file_path"),
            destination_path: row.get("destination_path"),
            tmdb_id: row.get("tmdb_id"),
            season_number: row.get("season_number"),
            reason: row.get("reason"),
            error: row.get("error"),
            timestamp: row
                .get::<Option<String>, _>("ts")
                .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(Utc::now),
        })
        .collect())
}

/// Status counts for the operation log's dashboard summary (§6). `created`
/// and `skipped` are read from `processed_files` (organizer-owned); `failed`
/// and `deleted` are this service's own audit counts, which double-count
/// nothing since they're disjoint tables.
async fn count_or_zero(main_db: &DbHandle, sql: &str) -> Result<i64> {
    match sqlx::query(sql).fetch_one(main_db.read_pool()).await {
        Ok(row) => Ok(row.get("c")),
        Err(e) if Error::from(e).is_missing_table() => Ok(0),
        Err(e) => Err(Error::from(e)),
    }
}

pub async fn status_counts(main_db: &DbHandle) -> Result<StatusCounts> {
    let created = count_or_zero(
        main_db,
        "SELECT count(*) AS c FROM processed_files WHERE destination_path IS NOT NULL AND destination_path != ''",
    )
    .await?;

    let skipped = count_or_zero(
        main_db,
        "SELECT count(*) AS c FROM processed_files WHERE (destination_path IS NULL OR destination_path = '') \
         AND (lower(reason) LIKE '%skip%' OR lower(reason) LIKE '%extra%' OR lower(reason) LIKE '%special content%' \
              OR lower(reason) LIKE '%unsupported%' OR lower(reason) LIKE '%adult content%')",
    )
    .await?;

    let failed = count_or_zero(main_db, "SELECT count(*) AS c FROM file_failures").await?;
    let deleted = count_or_zero(main_db, "SELECT count(*) AS c FROM file_deletions").await?;

    Ok(StatusCounts { created, failed, skipped, deleted })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::HandleConfig;

    async fn test_db() -> (tempfile::TempDir, DbHandle) {
        let dir = tempfile::tempdir().unwrap();
        let db = DbHandle::open("main", &dir.path().join("main.db"), HandleConfig::MAIN).await.unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn deletion_then_removal_leaves_no_rows() {
        let (_dir, db) = test_db().await;
        let req = FileOperationRequest {
            operation: FileOperationKind::Delete,
            source_path: "/x/y.mkv".into(),
            destination_path: None,
            tmdb_id: None,
            season_number: None,
            reason: None,
            error: None,
        };
        record_deletion(&db, &req).await.unwrap();
        let ops = list_operations(&db, 10, 0).await.unwrap();
        assert_eq!(ops.len(), 1);

        let removed = remove_deletion_record(&db, "/x/y.mkv").await.unwrap();
        assert_eq!(removed, 1);
        let ops = list_operations(&db, 10, 0).await.unwrap();
        assert!(ops.is_empty());
    }

    #[tokio::test]
    async fn failure_is_recorded() {
        let (_dir, db) = test_db().await;
        let req = FileOperationRequest {
            operation: FileOperationKind::Failed,
            source_path: "/x/y.mkv".into(),
            destination_path: None,
            tmdb_id: Some("42".into()),
            season_number: None,
            reason: None,
            error: Some("disk full".into()),
        };
        record_failure(&db, &req).await.unwrap();
        let counts = status_counts(&db).await.unwrap();
        assert_eq!(counts.failed, 1);
    }
}
