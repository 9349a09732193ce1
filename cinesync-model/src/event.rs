use serde::{Deserialize, Serialize};

use crate::scan::ScanType;

/// The four scan event payloads fanned out to the broadcaster (§4.2 event
/// contract). `Progress` is optional and carries no fixed shape here;
/// callers attach whatever progress snapshot they have.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScanEventPayload {
    ScanStarted {
        scan_type: ScanType,
    },
    ScanCompleted {
        scan_type: ScanType,
        total_files: i64,
        files_discovered: i64,
        files_updated: i64,
        files_removed: i64,
        duration_ms: i64,
    },
    ScanFailed {
        scan_type: ScanType,
        error: String,
    },
    Progress {
        scan_type: ScanType,
        current_path: String,
        files_seen: i64,
    },
}
