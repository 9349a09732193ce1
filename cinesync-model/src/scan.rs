use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `source_scans.type` (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
    Scheduled,
    Manual,
    Startup,
}

impl ScanType {
    pub const fn as_str(self) -> &'static str {
        match self {
            ScanType::Scheduled => "scheduled",
            ScanType::Manual => "manual",
            ScanType::Startup => "startup",
        }
    }
}

/// `source_scans.status` (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Running,
    Completed,
    Failed,
}

impl ScanStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            ScanStatus::Running => "running",
            ScanStatus::Completed => "completed",
            ScanStatus::Failed => "failed",
        }
    }
}

/// One row of DB-SOURCE `source_scans` (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceScanRecord {
    pub id: i64,
    pub source_root: String,
    pub scan_type: ScanType,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: ScanStatus,
    pub files_discovered: i64,
    pub files_updated: i64,
    pub files_removed: i64,
    pub total_files: i64,
    pub duration_ms: Option<i64>,
    pub error_message: Option<String>,
}

/// Aggregate counters produced by one completed scan, handed to the
/// broadcaster's `scan_completed` event (§4.2 event contract).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanCounters {
    pub total_files: i64,
    pub files_discovered: i64,
    pub files_updated: i64,
    pub files_removed: i64,
}
