//! `/api/jobs` CRUD plus `/run`, `/cancel`, `/executions`, `/events` (§6, §4.3).

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::sse::{Event, Sse};
use axum::Json;
use chrono::Utc;
use futures_util::stream::Stream;
use serde::Deserialize;

use cinesync_contracts::Topic;
use cinesync_core::{delete_job, get_job, insert_job, list_executions, list_jobs, update_job};
use cinesync_model::job::{JobExecution, JobRecord, JobStatus, ScheduleType};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<JobRecord>>> {
    Ok(Json(list_jobs(&state.core.main_db).await?))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<JobRecord>> {
    let job = get_job(&state.core.main_db, &id).await?.ok_or_else(|| AppError::not_found(format!("job {id}")))?;
    Ok(Json(job))
}

/// `POST /api/jobs` body (§4.3 Job record, operator-supplied subset — the
/// rest defaults the way a freshly registered job would).
#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_job_type")]
    pub job_type: String,
    pub schedule_type: ScheduleType,
    pub interval_seconds: Option<i64>,
    pub cron_expression: Option<String>,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub working_dir: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub timeout_seconds: Option<i64>,
    #[serde(default)]
    pub max_retries: i64,
    #[serde(default = "default_true")]
    pub log_output: bool,
}

fn default_job_type() -> String {
    "subprocess".to_string()
}

fn default_true() -> bool {
    true
}

pub async fn create(State(state): State<AppState>, Json(body): Json<CreateJobRequest>) -> AppResult<Json<JobRecord>> {
    let now = Utc::now();
    let job = JobRecord {
        id: body.id,
        name: body.name,
        description: body.description,
        job_type: body.job_type,
        status: JobStatus::Idle,
        schedule_type: body.schedule_type,
        interval_seconds: body.interval_seconds,
        cron_expression: body.cron_expression,
        command: body.command,
        args: body.args,
        working_dir: body.working_dir,
        enabled: body.enabled,
        category: body.category,
        tags: body.tags,
        dependencies: body.dependencies,
        timeout_seconds: body.timeout_seconds,
        max_retries: body.max_retries,
        log_output: body.log_output,
        created_at: now,
        updated_at: now,
        last_execution_at: None,
        next_execution_at: None,
        last_duration_ms: None,
    };
    insert_job(&state.core.main_db, job.clone()).await?;
    Ok(Json(job))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut body): Json<JobRecord>,
) -> AppResult<Json<JobRecord>> {
    body.id = id;
    update_job(&state.core.main_db, body.clone()).await?;
    Ok(Json(body))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<serde_json::Value>> {
    delete_job(&state.core.main_db, &id).await?;
    Ok(Json(serde_json::json!({"ok": true})))
}

#[derive(Debug, Deserialize, Default)]
pub struct RunQuery {
    #[serde(default)]
    pub force: bool,
}

pub async fn run(
    State(state): State<AppState>,
    Path(id): Path<String>,
    axum::extract::Query(query): axum::extract::Query<RunQuery>,
) -> AppResult<Json<serde_json::Value>> {
    state.core.scheduler.run(&id, query.force).await?;
    Ok(Json(serde_json::json!({"ok": true})))
}

pub async fn cancel(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<serde_json::Value>> {
    state.core.scheduler.cancel(&id).await?;
    Ok(Json(serde_json::json!({"ok": true})))
}

pub async fn executions(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Vec<JobExecution>>> {
    Ok(Json(list_executions(&state.core.main_db, &id).await?))
}

pub async fn events(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    crate::sse::topic_stream(&state, Topic::JobStatus)
}
