//! SignalR-compatible WebSocket channel for the spoof surface's dashboard
//! push (§4.4 topic `spoof-signalr`, §6 `/signalr/messages[/negotiate]`).
//! Framing is the JSON SignalR hub protocol: every frame is terminated by
//! `\x1e` (record separator), the handshake response is `{"error":null}`,
//! and messages are envelopes of `{"type":1,"target":"receiveMessage","arguments":[...]}`.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::time::timeout;

use cinesync_contracts::Topic;

use crate::state::AppState;

const RECORD_SEPARATOR: char = '\x1e';
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);
const READ_LIVENESS_TIMEOUT: Duration = Duration::from_secs(60);

/// Send `text`, giving up after `WRITE_TIMEOUT`. A timed-out or failed write
/// means the peer is gone; the caller closes the connection either way.
async fn send_with_deadline(sender: &mut SplitSink<WebSocket, Message>, text: String) -> bool {
    matches!(timeout(WRITE_TIMEOUT, sender.send(Message::Text(text))).await, Ok(Ok(())))
}

/// `POST /signalr/messages/negotiate` — the client's first step before
/// upgrading; real Radarr/Sonarr clients expect a `connectionId` and a
/// transport list naming WebSockets.
pub async fn negotiate() -> Response {
    Json(json!({
        "connectionId": uuid::Uuid::new_v4().to_string(),
        "negotiateVersion": 1,
        "availableTransports": [
            {"transport": "WebSockets", "transferFormats": ["Text", "Binary"]},
        ],
    }))
    .into_response()
}

pub async fn messages(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // Handshake: wait (at most HANDSHAKE_TIMEOUT) for the client's
    // `{"protocol":"json","version":1}\x1e` request, then reply with the
    // empty-error acknowledgement.
    match timeout(HANDSHAKE_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(_)))) => {
            if !send_with_deadline(&mut sender, format!("{{\"error\":null}}{RECORD_SEPARATOR}")).await {
                return;
            }
        }
        _ => return,
    }

    let mut events = state.core.broadcaster.subscribe(Topic::SpoofSignalr);
    let mut ping = tokio::time::interval(Duration::from_secs(10));
    let read_deadline = tokio::time::sleep(READ_LIVENESS_TIMEOUT);
    tokio::pin!(read_deadline);

    loop {
        tokio::select! {
            _ = ping.tick() => {
                if !send_with_deadline(&mut sender, format!("{{\"type\":6}}{RECORD_SEPARATOR}")).await {
                    break;
                }
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                let frame = json!({
                    "type": 1,
                    "target": "receiveMessage",
                    "arguments": [{"name": event.event_type, "body": event.payload}],
                });
                let text = format!("{}{RECORD_SEPARATOR}", frame);
                if !send_with_deadline(&mut sender, text).await {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {
                        read_deadline.as_mut().reset(tokio::time::Instant::now() + READ_LIVENESS_TIMEOUT);
                    }
                }
            }
            () = &mut read_deadline => {
                tracing::debug!("closing signalr socket: no client activity within the liveness window");
                break;
            }
        }
    }
}
