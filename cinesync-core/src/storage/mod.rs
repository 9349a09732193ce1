mod handle;
mod schema;

pub use handle::{DbHandle, HandleConfig};

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Row;

    async fn open_tmp(name: &'static str) -> (tempfile::TempDir, DbHandle) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("{name}.db"));
        let handle = DbHandle::open(name, &path, HandleConfig::SOURCE).await.unwrap();
        (dir, handle)
    }

    #[tokio::test]
    async fn bootstraps_source_schema_idempotently() {
        let (_dir, handle) = open_tmp("source").await;
        let count: i64 = sqlx::query("SELECT count(*) AS c FROM source_files")
            .fetch_one(handle.read_pool())
            .await
            .unwrap()
            .get("c");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn write_sync_round_trips_and_read_sees_it() {
        let (_dir, handle) = open_tmp("source").await;
        handle
            .write_sync("insert_source_file", crate::retry::RetryPolicy::DEFAULT, |conn| async move {
                sqlx::query(
                    "INSERT INTO source_files (file_path, name, size_bytes, modified_at, source_index, source_root, directory, relative_path, discovered_at, last_seen_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind("/library/movies/a.mkv")
                .bind("a.mkv")
                .bind(1024_i64)
                .bind("2026-01-01T00:00:00Z")
                .bind(0_i64)
                .bind("/library/movies")
                .bind("/library/movies")
                .bind("a.mkv")
                .bind("2026-01-01T00:00:00Z")
                .bind("2026-01-01T00:00:00Z")
                .execute(&mut *conn)
                .await
                .map(|_| ())
            })
            .await
            .unwrap();

        let path: String = sqlx::query("SELECT file_path FROM source_files LIMIT 1")
            .fetch_one(handle.read_pool())
            .await
            .unwrap()
            .get("file_path");
        assert_eq!(path, "/library/movies/a.mkv");
    }

    #[tokio::test]
    async fn tx_rolls_back_on_error() {
        let (_dir, handle) = open_tmp("source").await;
        let result: crate::error::Result<()> = handle
            .tx("rollback_probe", |txn| async move {
                sqlx::query("INSERT INTO source_scans (source_root, scan_type, started_at, status) VALUES ('/x', 'manual', '2026-01-01T00:00:00Z', 'running')")
                    .execute(&mut **txn)
                    .await?;
                Err(sqlx::Error::RowNotFound)
            })
            .await;
        assert!(result.is_err());

        let count: i64 = sqlx::query("SELECT count(*) AS c FROM source_scans")
            .fetch_one(handle.read_pool())
            .await
            .unwrap()
            .get("c");
        assert_eq!(count, 0);
    }
}
