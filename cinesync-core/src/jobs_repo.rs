//! Thin mapping between DB-MAIN `jobs` rows and `cinesync_model::job::JobRecord`
//! (§4.3 Job record). Kept separate from `scheduler` so the HTTP job routes
//! can list/inspect jobs without pulling in subprocess execution.

use std::str::FromStr;

use sqlx::Row;

use cinesync_model::job::{JobExecution, JobRecord, JobStatus, ScheduleType};

use crate::error::{Error, Result};
use crate::storage::DbHandle;

fn row_to_job(row: sqlx::sqlite::SqliteRow) -> Result<JobRecord> {
    let status_str: String = row.get("status");
    let schedule_str: String = row.get("schedule_type");
    let args_json: String = row.get("args");
    let tags_json: String = row.get("tags");
    let deps_json: String = row.get("dependencies");

    Ok(JobRecord {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get::<Option<String>, _>("description").unwrap_or_default(),
        job_type: row.get("job_type"),
        status: JobStatus::from_str(&status_str).map_err(|e| Error::Internal(e.to_string()))?,
        schedule_type: ScheduleType::from_str(&schedule_str).map_err(|e| Error::Internal(e.to_string()))?,
        interval_seconds: row.get("interval_seconds"),
        cron_expression: row.get("cron_expression"),
        command: row.get("command"),
        args: serde_json::from_str(&args_json).unwrap_or_default(),
        working_dir: row.get("working_dir"),
        enabled: row.get::<i64, _>("enabled") != 0,
        category: row.get("category"),
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        dependencies: serde_json::from_str(&deps_json).unwrap_or_default(),
        timeout_seconds: row.get("timeout_seconds"),
        max_retries: row.get("max_retries"),
        log_output: row.get::<Option<String>, _>("log_output").is_some(),
        created_at: parse_ts(row.get("created_at")),
        updated_at: parse_ts(row.get("updated_at")),
        last_execution_at: row.get::<Option<String>, _>("last_execution_at").map(|s| parse_ts(s)),
        next_execution_at: row.get::<Option<String>, _>("next_execution_at").map(|s| parse_ts(s)),
        last_duration_ms: row.get("last_duration_ms"),
    })
}

fn parse_ts(s: String) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(|_| chrono::Utc::now())
}

pub async fn list_jobs(db: &DbHandle) -> Result<Vec<JobRecord>> {
    let rows = sqlx::query("SELECT * FROM jobs ORDER BY name").fetch_all(db.read_pool()).await?;
    rows.into_iter().map(row_to_job).collect()
}

pub async fn get_job(db: &DbHandle, job_id: &str) -> Result<Option<JobRecord>> {
    let row = sqlx::query("SELECT * FROM jobs WHERE id = ?")
        .bind(job_id)
        .fetch_optional(db.read_pool())
        .await?;
    row.map(row_to_job).transpose()
}

pub async fn insert_job(db: &DbHandle, job: JobRecord) -> Result<()> {
    db.write_sync("insert_job", crate::retry::RetryPolicy::DEFAULT, move |conn| {
        let job = job.clone();
        async move {
            sqlx::query(
                "INSERT INTO jobs (id, name, description, job_type, status, schedule_type, interval_seconds, cron_expression, command, args, working_dir, enabled, category, tags, dependencies, timeout_seconds, max_retries, log_output, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&job.id)
            .bind(&job.name)
            .bind(&job.description)
            .bind(&job.job_type)
            .bind(job.status.as_str())
            .bind(job.schedule_type.as_str())
            .bind(job.interval_seconds)
            .bind(&job.cron_expression)
            .bind(&job.command)
            .bind(serde_json::to_string(&job.args).unwrap_or_default())
            .bind(&job.working_dir)
            .bind(job.enabled as i64)
            .bind(&job.category)
            .bind(serde_json::to_string(&job.tags).unwrap_or_default())
            .bind(serde_json::to_string(&job.dependencies).unwrap_or_default())
            .bind(job.timeout_seconds)
            .bind(job.max_retries)
            .bind(job.log_output.then(|| "enabled".to_string()))
            .bind(job.created_at.to_rfc3339())
            .bind(job.updated_at.to_rfc3339())
            .execute(&mut *conn)
            .await
            .map(|_| ())
        }
    })
    .await
}

/// Update the mutable fields of a job record (§6 `/api/jobs` CRUD). Status
/// and timestamps driven by `scheduler::run`/`transition` are left alone —
/// this is for operator edits of schedule/command/enabled state.
pub async fn update_job(db: &DbHandle, job: JobRecord) -> Result<()> {
    db.write_sync("update_job", crate::retry::RetryPolicy::DEFAULT, move |conn| {
        let job = job.clone();
        async move {
            sqlx::query(
                "UPDATE jobs SET name = ?, description = ?, job_type = ?, schedule_type = ?, interval_seconds = ?, cron_expression = ?, command = ?, args = ?, working_dir = ?, enabled = ?, category = ?, tags = ?, dependencies = ?, timeout_seconds = ?, max_retries = ?, log_output = ?, updated_at = ? WHERE id = ?",
            )
            .bind(&job.name)
            .bind(&job.description)
            .bind(&job.job_type)
            .bind(job.schedule_type.as_str())
            .bind(job.interval_seconds)
            .bind(&job.cron_expression)
            .bind(&job.command)
            .bind(serde_json::to_string(&job.args).unwrap_or_default())
            .bind(&job.working_dir)
            .bind(job.enabled as i64)
            .bind(&job.category)
            .bind(serde_json::to_string(&job.tags).unwrap_or_default())
            .bind(serde_json::to_string(&job.dependencies).unwrap_or_default())
            .bind(job.timeout_seconds)
            .bind(job.max_retries)
            .bind(job.log_output.then(|| "enabled".to_string()))
            .bind(chrono::Utc::now().to_rfc3339())
            .bind(&job.id)
            .execute(&mut *conn)
            .await
            .map(|_| ())
        }
    })
    .await
}

pub async fn delete_job(db: &DbHandle, job_id: &str) -> Result<()> {
    let job_id = job_id.to_string();
    db.write_sync("delete_job", crate::retry::RetryPolicy::DEFAULT, move |conn| {
        let job_id = job_id.clone();
        async move {
            sqlx::query("DELETE FROM job_executions WHERE job_id = ?")
                .bind(&job_id)
                .execute(&mut *conn)
                .await?;
            sqlx::query("DELETE FROM jobs WHERE id = ?")
                .bind(&job_id)
                .execute(&mut *conn)
                .await
                .map(|_| ())
        }
    })
    .await
}

/// List execution history for one job, most recent first (§6
/// `/api/jobs/{id}/executions`).
pub async fn list_executions(db: &DbHandle, job_id: &str) -> Result<Vec<JobExecution>> {
    let rows = sqlx::query(
        "SELECT job_id, started_at, finished_at, status, exit_code, log_output FROM job_executions WHERE job_id = ? ORDER BY started_at DESC",
    )
    .bind(job_id)
    .fetch_all(db.read_pool())
    .await?;

    rows.into_iter()
        .map(|row| {
            let status_str: String = row.get("status");
            Ok(JobExecution {
                job_id: row.get("job_id"),
                started_at: parse_ts(row.get("started_at")),
                finished_at: row.get::<Option<String>, _>("finished_at").map(parse_ts),
                status: JobStatus::from_str(&status_str).map_err(|e| Error::Internal(e.to_string()))?,
                exit_code: row.get("exit_code"),
                output: row.get::<Option<String>, _>("log_output").unwrap_or_default(),
                error: None,
            })
        })
        .collect()
}
