use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::media_type::MediaType;
use crate::processed_file::ProcessingStatus;

/// One row of DB-SOURCE `source_files` (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFileRecord {
    pub file_path: String,
    pub name: String,
    pub size_bytes: u64,
    pub size_formatted: String,
    pub modified_at: DateTime<Utc>,
    pub is_media_file: bool,
    pub media_type: Option<MediaType>,
    pub source_index: i64,
    pub source_root: String,
    pub directory: String,
    pub relative_path: String,
    pub extension: Option<String>,
    pub discovered_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub is_active: bool,
    pub processing_status: ProcessingStatus,
    pub tmdb_id: Option<String>,
    pub season_number: Option<i64>,
    pub episode_number: Option<i64>,
    pub last_processed_at: Option<DateTime<Utc>>,
}

/// Format a byte count the way the UI file-listing table does, e.g. `1.2 GB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} {}", UNITS[unit])
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_bytes() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }
}
