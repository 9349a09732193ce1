//! Event broadcaster (§4.4): per-topic subscriber sets delivered over
//! bounded channels, non-blocking publish, membership mutated under a
//! mutex (`Mutex<Vec<Sender>>`, `retain` drops closed/full subscribers),
//! covering five named topics. The HTTP-facing SSE/WebSocket transports
//! live in `cinesync-server`;
//! this module only owns topic membership and fan-out.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use cinesync_contracts::{BroadcastEvent, Topic};
use cinesync_model::event::ScanEventPayload;

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<BroadcastEvent>,
}

/// Owns the five topic subscriber sets (§4.4 Topics). Cheap to share via
/// `Arc`; cloning the broadcaster itself is not supported since every
/// component should hold the same instance.
pub struct Broadcaster {
    dashboard_stats: Mutex<Vec<Subscriber>>,
    file_operation: Mutex<Vec<Subscriber>>,
    job_status: Mutex<Vec<Subscriber>>,
    source_scan: Mutex<Vec<Subscriber>>,
    spoof_signalr: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster {
    pub fn new() -> Self {
        Broadcaster {
            dashboard_stats: Mutex::new(Vec::new()),
            file_operation: Mutex::new(Vec::new()),
            job_status: Mutex::new(Vec::new()),
            source_scan: Mutex::new(Vec::new()),
            spoof_signalr: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn set_for(&self, topic: Topic) -> &Mutex<Vec<Subscriber>> {
        match topic {
            Topic::DashboardStats => &self.dashboard_stats,
            Topic::FileOperation => &self.file_operation,
            Topic::JobStatus => &self.job_status,
            Topic::SourceScan => &self.source_scan,
            Topic::SpoofSignalr => &self.spoof_signalr,
        }
    }

    /// Register a new subscriber for `topic`, sized to the topic's buffer
    /// capacity (1 for lossy topics, 10 for job status, §4.4).
    pub fn subscribe(&self, topic: Topic) -> mpsc::Receiver<BroadcastEvent> {
        let (tx, rx) = mpsc::channel(topic.buffer_capacity());
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.set_for(topic).lock().push(Subscriber { id, tx });
        rx
    }

    /// `broadcast(topic, payload)`: non-blocking send to every subscriber;
    /// subscribers whose buffer is full or whose receiver is gone are
    /// dropped from the set with no redelivery attempt (§4.4 Publish
    /// contract).
    pub fn broadcast(&self, topic: Topic, event: BroadcastEvent) {
        let mut subscribers = self.set_for(topic).lock();
        let before = subscribers.len();
        subscribers.retain(|sub| match sub.tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(_) => {
                debug!(topic = topic.as_str(), subscriber = sub.id, "dropping subscriber (full or closed)");
                false
            }
        });
        if subscribers.len() != before {
            debug!(topic = topic.as_str(), dropped = before - subscribers.len(), "pruned broadcaster subscribers");
        }
    }

    /// Convenience wrapper for the scanner's four event types (§4.2 event
    /// contract), always published on the `source-scan` topic.
    pub async fn broadcast_scan(&self, payload: ScanEventPayload) {
        let event_type = match &payload {
            ScanEventPayload::ScanStarted { .. } => "scan_started",
            ScanEventPayload::ScanCompleted { .. } => "scan_completed",
            ScanEventPayload::ScanFailed { .. } => "scan_failed",
            ScanEventPayload::Progress { .. } => "scan_progress",
        };
        let json = serde_json::to_value(&payload).unwrap_or(serde_json::Value::Null);
        self.broadcast(Topic::SourceScan, BroadcastEvent::new(event_type, json));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let broadcaster = Broadcaster::new();
        let mut rx = broadcaster.subscribe(Topic::JobStatus);
        broadcaster.broadcast(Topic::JobStatus, BroadcastEvent::new("job_started", serde_json::json!({"id": 1})));
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, "job_started");
    }

    #[tokio::test]
    async fn full_buffer_drops_subscriber_without_blocking() {
        let broadcaster = Broadcaster::new();
        let _rx = broadcaster.subscribe(Topic::DashboardStats);
        for i in 0..5 {
            broadcaster.broadcast(Topic::DashboardStats, BroadcastEvent::new("tick", serde_json::json!(i)));
        }
        assert_eq!(broadcaster.dashboard_stats.lock().len(), 0);
    }
}
