//! Source scanner (§4.2): reconciles configured source roots against
//! DB-SOURCE and cross-references DB-MAIN for processing status. Walks
//! each root with `walkdir` and classifies files by extension, generalized
//! to the source/main two-database split.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use sqlx::Row;
use tracing::{error, warn};
use walkdir::WalkDir;

use cinesync_model::event::ScanEventPayload;
use cinesync_model::media_type;
use cinesync_model::scan::{ScanCounters, ScanType};

use crate::broadcaster::Broadcaster;
use crate::error::{Error, Result};
use crate::retry::{with_retry, RetryPolicy};
use crate::storage::DbHandle;

/// One configured source root, enumerated in configuration order — the
/// enumeration order is persisted as `source_index` (§4.2 Inputs).
#[derive(Debug, Clone)]
pub struct SourceRoot {
    pub index: i64,
    pub path: std::path::PathBuf,
}

pub struct Scanner {
    source_db: DbHandle,
    main_db: DbHandle,
    roots: Vec<SourceRoot>,
    broadcaster: Arc<Broadcaster>,
    /// Guards against overlapping scans (§4.2 Concurrency & ordering).
    running: tokio::sync::Mutex<()>,
}

impl Scanner {
    pub fn new(source_db: DbHandle, main_db: DbHandle, roots: Vec<SourceRoot>, broadcaster: Arc<Broadcaster>) -> Self {
        Scanner {
            source_db,
            main_db,
            roots,
            broadcaster,
            running: tokio::sync::Mutex::new(()),
        }
    }

    /// Run one full scan (step 1-7 of §4.2). Concurrent callers queue
    /// behind the mutex; the HTTP handler that kicks this off returns
    /// immediately and does not await completion itself.
    pub async fn run_scan(&self, scan_type: ScanType) -> Result<ScanCounters> {
        let _guard = self.running.lock().await;
        let started_at = Utc::now();

        self.broadcaster
            .broadcast_scan(ScanEventPayload::ScanStarted { scan_type })
            .await;

        let scan_id = self
            .source_db
            .write_sync("insert_scan_row", RetryPolicy::DEFAULT, move |conn| {
                let started_at = started_at;
                async move {
                    let row = sqlx::query(
                        "INSERT INTO source_scans (source_root, scan_type, started_at, status) VALUES (?, ?, ?, 'running') RETURNING id",
                    )
                    .bind("*")
                    .bind(scan_type.as_str())
                    .bind(started_at.to_rfc3339())
                    .fetch_one(&mut *conn)
                    .await?;
                    row.try_get::<i64, _>("id")
                }
            })
            .await?;

        match self.reconcile_all_roots().await {
            Ok(counters) => {
                self.complete_scan(scan_id, started_at, &counters).await?;
                self.broadcaster
                    .broadcast_scan(ScanEventPayload::ScanCompleted {
                        scan_type,
                        total_files: counters.total_files,
                        files_discovered: counters.files_discovered,
                        files_updated: counters.files_updated,
                        files_removed: counters.files_removed,
                        duration_ms: (Utc::now() - started_at).num_milliseconds().max(0),
                    })
                    .await;
                Ok(counters)
            }
            Err(e) => {
                self.fail_scan(scan_id, &e).await;
                self.broadcaster
                    .broadcast_scan(ScanEventPayload::ScanFailed {
                        scan_type,
                        error: e.to_string(),
                    })
                    .await;
                Err(e)
            }
        }
    }

    async fn reconcile_all_roots(&self) -> Result<ScanCounters> {
        // Step 2: mark every row inactive before the walk; reactivated as
        // each root's walk confirms the file still exists.
        self.source_db
            .write_sync("mark_all_inactive", RetryPolicy::DEFAULT, |conn| async move {
                sqlx::query("UPDATE source_files SET is_active = 0").execute(&mut *conn).await.map(|_| ())
            })
            .await?;

        let mut counters = ScanCounters::default();
        for root in self.roots.clone() {
            self.reconcile_root(&root, &mut counters).await?;
        }

        // Step 5: deletion sweep with the tighter scan-sweep retry profile.
        let removed = self
            .source_db
            .write_sync("deletion_sweep", RetryPolicy::SCAN_SWEEP, |conn| async move {
                sqlx::query("DELETE FROM source_files WHERE is_active = 0")
                    .execute(&mut *conn)
                    .await
                    .map(|r| r.rows_affected())
            })
            .await?;
        counters.files_removed = removed as i64;

        // Step 6: status catch-up for rows still unprocessed that now
        // resolve in DB-MAIN.
        self.status_catch_up().await?;

        counters.total_files = self.count_active().await?;
        Ok(counters)
    }

    async fn reconcile_root(&self, root: &SourceRoot, counters: &mut ScanCounters) -> Result<()> {
        let index = root.index;
        let existing: HashSet<String> = {
            let pool = self.source_db.read_pool().clone();
            with_retry(RetryPolicy::DEFAULT, "load_existing_paths", || {
                let pool = pool.clone();
                async move {
                    let rows = sqlx::query("SELECT file_path FROM source_files WHERE source_index = ?")
                        .bind(index)
                        .fetch_all(&pool)
                        .await?;
                    Ok(rows.into_iter().map(|r| r.get::<String, _>("file_path")).collect::<HashSet<_>>())
                }
            })
            .await
            .map_err(Error::from)?
        };

        let mut inserts = Vec::new();
        let mut updates = Vec::new();

        for entry in WalkDir::new(&root.path).follow_links(false).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(media) = media_type::classify(name) else {
                continue;
            };
            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    warn!(path = %path.display(), "failed to read metadata during scan: {e}");
                    continue;
                }
            };

            let path_str = path.to_string_lossy().to_string();
            let size_bytes = metadata.len();
            let modified_at = metadata
                .modified()
                .map(chrono::DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());

            if existing.contains(&path_str) {
                updates.push((path_str, size_bytes, modified_at, media));
            } else {
                inserts.push((path_str, name.to_string(), size_bytes, modified_at, media, root.clone()));
            }
        }

        counters.files_discovered += inserts.len() as i64;
        counters.files_updated += updates.len() as i64;

        if !inserts.is_empty() {
            self.insert_batch(inserts).await?;
        }
        if !updates.is_empty() {
            self.update_batch(updates).await?;
        }
        Ok(())
    }

    async fn insert_batch(
        &self,
        rows: Vec<(String, String, u64, chrono::DateTime<Utc>, media_type::MediaType, SourceRoot)>,
    ) -> Result<()> {
        self.source_db
            .tx("insert_batch", move |txn| {
                let rows = rows.clone();
                async move {
                    let now = Utc::now().to_rfc3339();
                    for (path, name, size, modified_at, media, root) in rows {
                        let directory = Path::new(&path)
                            .parent()
                            .map(|p| p.to_string_lossy().to_string())
                            .unwrap_or_default();
                        let relative_path = Path::new(&path)
                            .strip_prefix(&root.path)
                            .map(|p| p.to_string_lossy().to_string())
                            .unwrap_or_else(|_| path.clone());
                        let extension = Path::new(&path).extension().and_then(|e| e.to_str()).unwrap_or_default();

                        sqlx::query(
                            "INSERT INTO source_files (file_path, name, size_bytes, modified_at, is_media_file, media_type, source_index, source_root, directory, relative_path, extension, discovered_at, last_seen_at, is_active, processing_status) VALUES (?, ?, ?, ?, 1, ?, ?, ?, ?, ?, ?, ?, ?, 1, 'unprocessed')",
                        )
                        .bind(&path)
                        .bind(&name)
                        .bind(size as i64)
                        .bind(modified_at.to_rfc3339())
                        .bind(media.as_str())
                        .bind(root.index)
                        .bind(root.path.to_string_lossy().to_string())
                        .bind(directory)
                        .bind(relative_path)
                        .bind(extension)
                        .bind(&now)
                        .bind(&now)
                        .execute(&mut **txn)
                        .await?;
                    }
                    Ok(())
                }
            })
            .await
    }

    async fn update_batch(
        &self,
        rows: Vec<(String, u64, chrono::DateTime<Utc>, media_type::MediaType)>,
    ) -> Result<()> {
        self.source_db
            .tx("update_batch", move |txn| {
                let rows = rows.clone();
                async move {
                    let now = Utc::now().to_rfc3339();
                    for (path, size, modified_at, media) in rows {
                        sqlx::query(
                            "UPDATE source_files SET size_bytes = ?, modified_at = ?, media_type = ?, is_active = 1, last_seen_at = ? WHERE file_path = ?",
                        )
                        .bind(size as i64)
                        .bind(modified_at.to_rfc3339())
                        .bind(media.as_str())
                        .bind(&now)
                        .bind(&path)
                        .execute(&mut **txn)
                        .await?;
                    }
                    Ok(())
                }
            })
            .await
    }

    async fn status_catch_up(&self) -> Result<()> {
        let main_pool = self.main_db.read_pool().clone();
        let unprocessed: Vec<String> = {
            let pool = self.source_db.read_pool().clone();
            sqlx::query("SELECT file_path FROM source_files WHERE processing_status = 'unprocessed'")
                .fetch_all(&pool)
                .await
                .map_err(Error::from)?
                .into_iter()
                .map(|r| r.get::<String, _>("file_path"))
                .collect()
        };
        if unprocessed.is_empty() {
            return Ok(());
        }

        let mut matched = Vec::new();
        for path in unprocessed {
            let row = sqlx::query(
                "SELECT destination_path, tmdb_id, season_number, reason FROM processed_files WHERE file_path = ? ORDER BY processed_at DESC LIMIT 1",
            )
            .bind(&path)
            .fetch_optional(&main_pool)
            .await
            .map_err(Error::from)?;
            if let Some(row) = row {
                let destination_path: Option<String> = row.get("destination_path");
                let reason: Option<String> = row.get("reason");
                let destination_exists = destination_path
                    .as_ref()
                    .map(|p| std::path::Path::new(p).exists())
                    .unwrap_or(false);
                let tmdb_id: Option<String> = row.get("tmdb_id");
                let season_number: Option<i64> = row.get("season_number");
                let pf = cinesync_model::processed_file::ProcessedFileRow {
                    file_path: path.clone(),
                    destination_path,
                    tmdb_id: tmdb_id.clone(),
                    season_number,
                    reason,
                    file_size: None,
                    processed_at: None,
                };
                let status = pf.derive_status(destination_exists);
                matched.push((path, status, tmdb_id, season_number));
            }
        }
        if matched.is_empty() {
            return Ok(());
        }

        self.source_db
            .tx("status_catch_up", move |txn| {
                let matched = matched.clone();
                async move {
                    for (path, status, tmdb_id, season_number) in matched {
                        sqlx::query(
                            "UPDATE source_files SET processing_status = ?, tmdb_id = ?, season_number = ?, last_processed_at = ? WHERE file_path = ?",
                        )
                        .bind(status.to_string())
                        .bind(tmdb_id)
                        .bind(season_number)
                        .bind(Utc::now().to_rfc3339())
                        .bind(&path)
                        .execute(&mut **txn)
                        .await?;
                    }
                    Ok(())
                }
            })
            .await
    }

    async fn count_active(&self) -> Result<i64> {
        let row = sqlx::query("SELECT count(*) AS c FROM source_files WHERE is_active = 1")
            .fetch_one(self.source_db.read_pool())
            .await
            .map_err(Error::from)?;
        Ok(row.get::<i64, _>("c"))
    }

    async fn complete_scan(&self, scan_id: i64, started_at: chrono::DateTime<Utc>, counters: &ScanCounters) -> Result<()> {
        let counters = counters.clone();
        self.source_db
            .write_sync("complete_scan", RetryPolicy::DEFAULT, move |conn| {
                let counters = counters.clone();
                async move {
                    let duration_ms = (Utc::now() - started_at).num_milliseconds().max(0);
                    sqlx::query(
                        "UPDATE source_scans SET status = 'completed', completed_at = ?, files_discovered = ?, files_updated = ?, files_removed = ?, total_files = ?, duration_ms = ? WHERE id = ?",
                    )
                    .bind(Utc::now().to_rfc3339())
                    .bind(counters.files_discovered)
                    .bind(counters.files_updated)
                    .bind(counters.files_removed)
                    .bind(counters.total_files)
                    .bind(duration_ms)
                    .bind(scan_id)
                    .execute(&mut *conn)
                    .await
                    .map(|_| ())
                }
            })
            .await
    }

    async fn fail_scan(&self, scan_id: i64, err: &Error) {
        let message = err.to_string();
        let result = self
            .source_db
            .write_sync("fail_scan", RetryPolicy::DEFAULT, move |conn| {
                let message = message.clone();
                async move {
                    sqlx::query("UPDATE source_scans SET status = 'failed', completed_at = ?, error_message = ? WHERE id = ?")
                        .bind(Utc::now().to_rfc3339())
                        .bind(message)
                        .bind(scan_id)
                        .execute(&mut *conn)
                        .await
                        .map(|_| ())
                }
            })
            .await;
        if let Err(e) = result {
            error!("failed to persist scan failure row: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcaster::Broadcaster;
    use crate::storage::HandleConfig;

    async fn test_dbs() -> (tempfile::TempDir, DbHandle, DbHandle) {
        let dir = tempfile::tempdir().unwrap();
        let source = DbHandle::open("source", &dir.path().join("source.db"), HandleConfig::SOURCE)
            .await
            .unwrap();
        let main = DbHandle::open("main", &dir.path().join("main.db"), HandleConfig::MAIN)
            .await
            .unwrap();
        (dir, source, main)
    }

    #[tokio::test]
    async fn scan_discovers_media_files_and_skips_others() {
        let (dir, source, main) = test_dbs().await;
        let library = dir.path().join("library");
        std::fs::create_dir_all(&library).unwrap();
        std::fs::write(library.join("movie.mkv"), b"data").unwrap();
        std::fs::write(library.join("readme.txt"), b"nope").unwrap();

        let broadcaster = Arc::new(Broadcaster::new());
        let scanner = Scanner::new(
            source.clone(),
            main,
            vec![SourceRoot { index: 0, path: library }],
            broadcaster,
        );

        let counters = scanner.run_scan(ScanType::Manual).await.unwrap();
        assert_eq!(counters.files_discovered, 1);
        assert_eq!(counters.total_files, 1);
    }

    #[tokio::test]
    async fn second_scan_removes_deleted_file() {
        let (dir, source, main) = test_dbs().await;
        let library = dir.path().join("library");
        std::fs::create_dir_all(&library).unwrap();
        let file_path = library.join("movie.mkv");
        std::fs::write(&file_path, b"data").unwrap();

        let broadcaster = Arc::new(Broadcaster::new());
        let scanner = Scanner::new(
            source.clone(),
            main,
            vec![SourceRoot { index: 0, path: library }],
            broadcaster,
        );
        scanner.run_scan(ScanType::Manual).await.unwrap();

        std::fs::remove_file(&file_path).unwrap();
        let counters = scanner.run_scan(ScanType::Manual).await.unwrap();
        assert_eq!(counters.files_removed, 1);
        assert_eq!(counters.total_files, 0);
    }
}
