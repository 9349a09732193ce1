use serde::Serialize;

/// A broadcaster topic (§4.4). Each topic has its own subscriber set and
/// buffer capacity; the enum exists so callers can't typo a topic name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    DashboardStats,
    FileOperation,
    JobStatus,
    SourceScan,
    SpoofSignalr,
}

impl Topic {
    pub const fn as_str(self) -> &'static str {
        match self {
            Topic::DashboardStats => "dashboard-stats",
            Topic::FileOperation => "file-operation",
            Topic::JobStatus => "job-status",
            Topic::SourceScan => "source-scan",
            Topic::SpoofSignalr => "spoof-signalr",
        }
    }

    /// Lossy topics carry a capacity-1 channel; `job-status` gets 10 per
    /// §4.4's per-topic subscriber buffer rule.
    pub const fn buffer_capacity(self) -> usize {
        match self {
            Topic::JobStatus => 10,
            _ => 1,
        }
    }
}

/// A payload handed to the broadcaster for fan-out. `event_type` becomes the
/// SSE `type` field and the SignalR `arguments[0].name` field (§4.4).
#[derive(Debug, Clone, Serialize)]
pub struct BroadcastEvent {
    pub event_type: String,
    pub payload: serde_json::Value,
}

impl BroadcastEvent {
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }
}
