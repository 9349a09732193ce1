use serde::{Deserialize, Serialize};
use std::fmt;

/// Derived per-file processing status (§3, status derivation rules).
/// Never persisted directly — it is computed from `processed_files` columns
/// at read time, then cached back onto `source_files.processing_status`
/// during scan reconciliation (§4.2 steps 3 and 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Unprocessed,
    Processed,
    Failed,
    Skipped,
}

impl ProcessingStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            ProcessingStatus::Unprocessed => "unprocessed",
            ProcessingStatus::Processed => "processed",
            ProcessingStatus::Failed => "failed",
            ProcessingStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProcessingStatus {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unprocessed" => Ok(ProcessingStatus::Unprocessed),
            "processed" => Ok(ProcessingStatus::Processed),
            "failed" => Ok(ProcessingStatus::Failed),
            "skipped" => Ok(ProcessingStatus::Skipped),
            other => Err(crate::error::Error::InvalidProcessingStatus(other.to_string())),
        }
    }
}

/// Keywords that mark a `processed_files.reason` as an intentional skip
/// rather than a failure (§3 status derivation).
const SKIP_KEYWORDS: &[&str] = &[
    "skipped",
    "extra",
    "special content",
    "unsupported",
    "adult content",
];

/// A row read from DB-MAIN `processed_files` (§3). `destination_path`
/// existing on disk is checked by the caller (storage layer has no
/// filesystem access of its own); this type only carries what the DB row
/// says.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedFileRow {
    pub file_path: String,
    pub destination_path: Option<String>,
    pub tmdb_id: Option<String>,
    pub season_number: Option<i64>,
    pub reason: Option<String>,
    pub file_size: Option<i64>,
    pub processed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl ProcessedFileRow {
    /// Derive the semantic status per §3:
    /// - destination_path set and exists on disk => processed
    /// - destination_path set and missing on disk => failed
    /// - reason matches a skip keyword => skipped
    /// - otherwise => failed
    pub fn derive_status(&self, destination_exists: bool) -> ProcessingStatus {
        if let Some(dest) = &self.destination_path {
            if !dest.is_empty() {
                return if destination_exists {
                    ProcessingStatus::Processed
                } else {
                    ProcessingStatus::Failed
                };
            }
        }
        if let Some(reason) = &self.reason {
            let lower = reason.to_lowercase();
            if SKIP_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
                return ProcessingStatus::Skipped;
            }
        }
        ProcessingStatus::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(destination_path: Option<&str>, reason: Option<&str>) -> ProcessedFileRow {
        ProcessedFileRow {
            file_path: "/src/a.mkv".into(),
            destination_path: destination_path.map(String::from),
            tmdb_id: None,
            season_number: None,
            reason: reason.map(String::from),
            file_size: None,
            processed_at: None,
        }
    }

    #[test]
    fn destination_exists_is_processed() {
        let r = row(Some("/out/a.mkv"), None);
        assert_eq!(r.derive_status(true), ProcessingStatus::Processed);
    }

    #[test]
    fn destination_missing_is_failed() {
        let r = row(Some("/out/a.mkv"), None);
        assert_eq!(r.derive_status(false), ProcessingStatus::Failed);
    }

    #[test]
    fn skip_keyword_is_skipped() {
        let r = row(None, Some("Skipped: extra content"));
        assert_eq!(r.derive_status(false), ProcessingStatus::Skipped);
    }

    #[test]
    fn no_destination_no_skip_reason_is_failed() {
        let r = row(None, Some("unknown codec"));
        assert_eq!(r.derive_status(false), ProcessingStatus::Failed);
    }
}
