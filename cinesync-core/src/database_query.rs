//! Paginated, filtered reads of DB-MAIN `processed_files` for the UI's
//! database browser (§6 `/api/database/search`, `/api/database/export`).

use serde::{Deserialize, Serialize};
use sqlx::Row;

use crate::error::{Error, Result};
use crate::storage::DbHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseFilter {
    Movies,
    Tvshows,
    Processed,
    Skipped,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSearchParams {
    #[serde(rename = "type")]
    pub filter: Option<DatabaseFilter>,
    pub query: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessedFileEntry {
    pub file_path: String,
    pub destination_path: Option<String>,
    pub tmdb_id: Option<String>,
    pub season_number: Option<i64>,
    pub reason: Option<String>,
    pub file_size: i64,
    pub processed_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseSearchResult {
    pub entries: Vec<ProcessedFileEntry>,
    pub total: i64,
}

fn where_clause(params: &DatabaseSearchParams) -> (String, Vec<String>) {
    let mut clauses = Vec::new();
    let mut binds = Vec::new();

    match params.filter {
        Some(DatabaseFilter::Movies) => clauses.push("season_number IS NULL".to_string()),
        Some(DatabaseFilter::Tvshows) => clauses.push("season_number IS NOT NULL".to_string()),
        Some(DatabaseFilter::Processed) => {
            clauses.push("destination_path IS NOT NULL AND destination_path != ''".to_string())
        }
        Some(DatabaseFilter::Skipped) => clauses.push(
            "(destination_path IS NULL OR destination_path = '') AND \
             (lower(reason) LIKE '%skip%' OR lower(reason) LIKE '%extra%' OR lower(reason) LIKE '%special content%' \
              OR lower(reason) LIKE '%unsupported%' OR lower(reason) LIKE '%adult content%')"
                .to_string(),
        ),
        None => {}
    }

    if let Some(query) = &params.query {
        if !query.is_empty() {
            clauses.push("(file_path LIKE ? OR proper_name LIKE ?)".to_string());
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

pub async fn search(db: &DbHandle, params: &DatabaseSearchParams) -> Result<DatabaseSearchResult> {
    let (clause, binds) = where_clause(params);

    let mut count_query = sqlx::query(&format!("SELECT count(*) AS c FROM processed_files {clause}"));
    for bind in &binds {
        count_query = count_query.bind(bind);
    }
    let total: i64 = match count_query.fetch_one(db.read_pool()).await {
        Ok(row) => row.get("c"),
        Err(e) if Error::from(e).is_missing_table() => return Ok(DatabaseSearchResult { entries: vec![], total: 0 }),
        Err(e) => return Err(Error::from(e)),
    };

    let mut rows_query = sqlx::query(&format!(
        "SELECT file_path, destination_path, tmdb_id, season_number, reason, file_size, processed_at \
         FROM processed_files {clause} ORDER BY processed_at DESC LIMIT ? OFFSET ?"
    ));
    for bind in &binds {
        rows_query = rows_query.bind(bind);
    }
    rows_query = rows_query.bind(params.limit).bind(params.offset);

    let rows = rows_query.fetch_all(db.read_pool()).await.map_err(Error::from)?;
    let entries = rows
        .into_iter()
        .map(|row| ProcessedFileEntry {
            file_path: row.get("file_path"),
            destination_path: row.get("destination_path"),
            tmdb_id: row.get("tmdb_id"),
            season_number: row.get("season_number"),
            reason: row.get("reason"),
            file_size: row.get("file_size"),
            processed_at: row
                .get::<Option<String>, _>("processed_at")
                .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&chrono::Utc)),
        })
        .collect();

    Ok(DatabaseSearchResult { entries, total })
}

/// All rows for `/api/database/export`'s CSV stream (§6 headers: `File
/// Path, Destination Path, TMDB ID, Season Number, Reason, File Size`). No
/// pagination — the caller streams the writer directly to the response
/// body.
pub async fn export_all(db: &DbHandle) -> Result<Vec<ProcessedFileEntry>> {
    let rows = match sqlx::query(
        "SELECT file_path, destination_path, tmdb_id, season_number, reason, file_size, processed_at FROM processed_files ORDER BY processed_at",
    )
    .fetch_all(db.read_pool())
    .await
    {
        Ok(rows) => rows,
        Err(e) if Error::from(e).is_missing_table() => return Ok(vec![]),
        Err(e) => return Err(Error::from(e)),
    };

    Ok(rows
        .into_iter()
        .map(|row| ProcessedFileEntry {
            file_path: row.get("file_path"),
            destination_path: row.get("destination_path"),
            tmdb_id: row.get("tmdb_id"),
            season_number: row.get("season_number"),
            reason: row.get("reason"),
            file_size: row.get("file_size"),
            processed_at: row
                .get::<Option<String>, _>("processed_at")
                .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&chrono::Utc)),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::HandleConfig;

    #[tokio::test]
    async fn search_filters_by_type_and_query() {
        let dir = tempfile::tempdir().unwrap();
        let db = DbHandle::open("main", &dir.path().join("main.db"), HandleConfig::MAIN).await.unwrap();
        db.write_sync("seed", crate::retry::RetryPolicy::DEFAULT, |conn| async move {
            sqlx::query(
                "INSERT INTO processed_files (file_path, destination_path, proper_name, file_size, processed_at) VALUES ('/a.mkv', '/out/a.mkv', 'A', 10, '2026-01-01T00:00:00Z')",
            )
            .execute(&mut *conn)
            .await
            .map(|_| ())
        })
        .await
        .unwrap();

        let params = DatabaseSearchParams {
            filter: Some(DatabaseFilter::Movies),
            query: Some("a".to_string()),
            limit: 50,
            offset: 0,
        };
        let result = search(&db, &params).await.unwrap();
        assert_eq!(result.total, 1);
        assert_eq!(result.entries.len(), 1);
    }
}
