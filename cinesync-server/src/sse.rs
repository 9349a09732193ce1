//! SSE transport for the broadcaster's topics (§4.4, §6
//! `/api/file-operations/events`, `/api/dashboard/events`, `/api/jobs/events`).
//! One subscriber per connection; the stream ends the moment the
//! broadcaster drops it (buffer full or client gone), matching the
//! no-redelivery contract in §4.4.

use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;

use cinesync_contracts::Topic;

use crate::state::AppState;

/// Subscribe to `topic` and adapt the broadcaster's channel into an SSE
/// stream, emitting an initial `connected` frame the way the UI's
/// `EventSource` client expects to see before the first real event. Frames
/// carry no named `event:` field — a plain `EventSource.onmessage` listener
/// must see every frame, so the event kind travels as a `"type"` key inside
/// the `data:` JSON instead.
pub fn topic_stream(state: &AppState, topic: Topic) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.core.broadcaster.subscribe(topic);

    let stream = async_stream::stream! {
        yield Ok(Event::default().data("{\"type\":\"connected\"}"));
        while let Some(event) = rx.recv().await {
            let data = serde_json::to_string(&typed_payload(&event.event_type, event.payload)).unwrap_or_else(|_| "null".to_string());
            yield Ok(Event::default().data(data));
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("keep-alive"))
}

/// Merge `event_type` into `payload` as its `"type"` key. Non-object
/// payloads are wrapped so `"type"` always has somewhere to live.
fn typed_payload(event_type: &str, payload: serde_json::Value) -> serde_json::Value {
    match payload {
        serde_json::Value::Object(mut map) => {
            map.insert("type".to_string(), serde_json::Value::String(event_type.to_string()));
            serde_json::Value::Object(map)
        }
        other => serde_json::json!({ "type": event_type, "data": other }),
    }
}
