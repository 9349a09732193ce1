//! Idempotent schema bootstrap for the three embedded databases (§3, §4.5,
//! §4.6). Every statement is `CREATE TABLE IF NOT EXISTS` or an additive
//! `ALTER TABLE ... ADD COLUMN`, so re-running `bootstrap` against an
//! already-populated file is always safe.

use sqlx::SqliteConnection;

use crate::error::Result;

pub async fn bootstrap(db_name: &str, conn: &mut SqliteConnection) -> Result<()> {
    match db_name {
        "source" => bootstrap_source(conn).await,
        "main" => bootstrap_main(conn).await,
        "aux" => bootstrap_aux(conn).await,
        other => {
            tracing::warn!(db = other, "unrecognized database name, applying DB-SOURCE schema");
            bootstrap_source(conn).await
        }
    }
}

async fn bootstrap_source(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS source_files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_path TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            modified_at TEXT NOT NULL,
            is_media_file INTEGER NOT NULL DEFAULT 0,
            media_type TEXT,
            source_index INTEGER NOT NULL,
            source_root TEXT NOT NULL,
            directory TEXT NOT NULL,
            relative_path TEXT NOT NULL,
            extension TEXT,
            discovered_at TEXT NOT NULL,
            last_seen_at TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            processing_status TEXT NOT NULL DEFAULT 'unprocessed',
            tmdb_id INTEGER,
            season_number INTEGER,
            episode_number INTEGER,
            last_processed_at TEXT
        );
        "#,
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_source_files_active ON source_files(is_active);")
        .execute(&mut *conn)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_source_files_source_root ON source_files(source_root);")
        .execute(&mut *conn)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_source_files_status ON source_files(processing_status);")
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS source_scans (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_root TEXT NOT NULL,
            scan_type TEXT NOT NULL,
            started_at TEXT NOT NULL,
            completed_at TEXT,
            status TEXT NOT NULL,
            files_discovered INTEGER NOT NULL DEFAULT 0,
            files_updated INTEGER NOT NULL DEFAULT 0,
            files_removed INTEGER NOT NULL DEFAULT 0,
            total_files INTEGER NOT NULL DEFAULT 0,
            duration_ms INTEGER,
            error_message TEXT
        );
        "#,
    )
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn bootstrap_main(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS processed_files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_path TEXT NOT NULL,
            destination_path TEXT,
            tmdb_id INTEGER,
            season_number INTEGER,
            reason TEXT,
            file_size INTEGER NOT NULL DEFAULT 0,
            processed_at TEXT NOT NULL,
            proper_name TEXT,
            year INTEGER,
            episode_number INTEGER
        );
        "#,
    )
    .execute(&mut *conn)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_processed_files_group ON processed_files(proper_name, year, tmdb_id);")
        .execute(&mut *conn)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_processed_files_destination ON processed_files(destination_path);")
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS file_deletions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_path TEXT NOT NULL,
            destination_path TEXT,
            tmdb_id TEXT,
            season_number INTEGER,
            deleted_at TEXT NOT NULL,
            reason TEXT
        );
        "#,
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS file_failures (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_path TEXT NOT NULL,
            tmdb_id TEXT,
            season_number INTEGER,
            reason TEXT,
            failed_at TEXT NOT NULL,
            error_message TEXT NOT NULL,
            attempt_count INTEGER NOT NULL DEFAULT 1
        );
        "#,
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT,
            job_type TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'idle',
            schedule_type TEXT NOT NULL,
            interval_seconds INTEGER,
            cron_expression TEXT,
            command TEXT NOT NULL,
            args TEXT NOT NULL DEFAULT '[]',
            working_dir TEXT,
            enabled INTEGER NOT NULL DEFAULT 1,
            category TEXT,
            tags TEXT NOT NULL DEFAULT '[]',
            dependencies TEXT NOT NULL DEFAULT '[]',
            timeout_seconds INTEGER,
            max_retries INTEGER NOT NULL DEFAULT 0,
            log_output TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            last_execution_at TEXT,
            next_execution_at TEXT,
            last_duration_ms INTEGER
        );
        "#,
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS job_executions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id TEXT NOT NULL REFERENCES jobs(id),
            started_at TEXT NOT NULL,
            finished_at TEXT,
            status TEXT NOT NULL,
            exit_code INTEGER,
            log_output TEXT
        );
        "#,
    )
    .execute(&mut *conn)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_job_executions_job ON job_executions(job_id);")
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS folder_mappings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            folder_path TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL,
            service_type TEXT NOT NULL,
            api_key TEXT NOT NULL,
            enabled INTEGER NOT NULL DEFAULT 1
        );
        "#,
    )
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn bootstrap_aux(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS file_details (
            file_path TEXT PRIMARY KEY,
            quality TEXT,
            destination_path TEXT,
            synthesized_at TEXT NOT NULL
        );
        "#,
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tmdb_entities (
            tmdb_id INTEGER NOT NULL,
            media_type TEXT NOT NULL,
            payload TEXT NOT NULL,
            poster_path TEXT,
            last_accessed TEXT NOT NULL,
            PRIMARY KEY (tmdb_id, media_type)
        );
        "#,
    )
    .execute(&mut *conn)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tmdb_entities_last_accessed ON tmdb_entities(last_accessed);")
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tmdb_cache_keys (
            cache_key TEXT PRIMARY KEY,
            tmdb_id INTEGER NOT NULL,
            media_type TEXT NOT NULL,
            last_accessed TEXT NOT NULL
        );
        "#,
    )
    .execute(&mut *conn)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tmdb_cache_keys_entity ON tmdb_cache_keys(tmdb_id, media_type);")
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recent_media (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tmdb_id INTEGER NOT NULL,
            media_type TEXT NOT NULL,
            season_number INTEGER,
            episode_number INTEGER,
            added_at TEXT NOT NULL
        );
        "#,
    )
    .execute(&mut *conn)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_recent_media_added ON recent_media(added_at);")
        .execute(&mut *conn)
        .await?;

    Ok(())
}
