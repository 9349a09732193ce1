use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Job state machine (§4.3): `idle -> running -> {completed|failed|cancelled}`,
/// with `disabled` as a sticky override that blocks scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
    Disabled,
}

impl JobStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            JobStatus::Idle => "idle",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Disabled => "disabled",
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(JobStatus::Idle),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            "disabled" => Ok(JobStatus::Disabled),
            other => Err(crate::error::Error::InvalidProcessingStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleType {
    Manual,
    Interval,
    Cron,
    Startup,
}

impl ScheduleType {
    pub const fn as_str(self) -> &'static str {
        match self {
            ScheduleType::Manual => "manual",
            ScheduleType::Interval => "interval",
            ScheduleType::Cron => "cron",
            ScheduleType::Startup => "startup",
        }
    }
}

impl std::str::FromStr for ScheduleType {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(ScheduleType::Manual),
            "interval" => Ok(ScheduleType::Interval),
            "cron" => Ok(ScheduleType::Cron),
            "startup" => Ok(ScheduleType::Startup),
            other => Err(crate::error::Error::InvalidProcessingStatus(other.to_string())),
        }
    }
}

/// Persisted scheduler state, one row per job in DB-MAIN `jobs` (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub job_type: String,
    pub status: JobStatus,
    pub schedule_type: ScheduleType,
    pub interval_seconds: Option<i64>,
    pub cron_expression: Option<String>,
    pub command: String,
    pub args: Vec<String>,
    pub working_dir: Option<String>,
    pub enabled: bool,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub dependencies: Vec<String>,
    pub timeout_seconds: Option<i64>,
    pub max_retries: i64,
    pub log_output: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_execution_at: Option<DateTime<Utc>>,
    pub next_execution_at: Option<DateTime<Utc>>,
    pub last_duration_ms: Option<i64>,
}

impl JobRecord {
    /// A job may be triggered unless it is `disabled`, or already `running`
    /// and the caller did not pass `force` (§4.3 execution contract).
    pub fn can_run(&self, force: bool) -> bool {
        if self.status == JobStatus::Disabled || !self.enabled {
            return false;
        }
        force || self.status != JobStatus::Running
    }
}

/// One subprocess execution's outcome, appended to the job's execution log
/// and broadcast on the `job-status` topic (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobExecution {
    pub job_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: JobStatus,
    pub exit_code: Option<i32>,
    pub output: String,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(status: JobStatus, enabled: bool) -> JobRecord {
        JobRecord {
            id: "j1".into(),
            name: "n".into(),
            description: "d".into(),
            job_type: "subprocess".into(),
            status,
            schedule_type: ScheduleType::Manual,
            interval_seconds: None,
            cron_expression: None,
            command: "/bin/true".into(),
            args: vec![],
            working_dir: None,
            enabled,
            category: None,
            tags: vec![],
            dependencies: vec![],
            timeout_seconds: None,
            max_retries: 0,
            log_output: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_execution_at: None,
            next_execution_at: None,
            last_duration_ms: None,
        }
    }

    #[test]
    fn disabled_job_cannot_run() {
        assert!(!job(JobStatus::Idle, false).can_run(false));
        assert!(!job(JobStatus::Disabled, true).can_run(true));
    }

    #[test]
    fn running_job_requires_force() {
        let running = job(JobStatus::Running, true);
        assert!(!running.can_run(false));
        assert!(running.can_run(true));
    }

    #[test]
    fn idle_job_can_run() {
        assert!(job(JobStatus::Idle, true).can_run(false));
    }
}
