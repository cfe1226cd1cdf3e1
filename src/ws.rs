use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{stream::SplitSink, stream::SplitStream, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::api::AppState;
use crate::models::*;

/// How often to send WebSocket Ping frames.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// How long to wait for a Pong response before considering the connection dead.
const PONG_TIMEOUT: Duration = Duration::from_secs(60);

// ── WebSocket message types ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    FileCreated {
        file: File,
    },
    FileUpdated {
        file: File,
    },
    FileDeleted {
        file_id: i64,
    },
    StatusChanged {
        file: File,
        entry: HistoryEntry,
    },
    CommentAdded {
        comment: Comment,
    },
    AttachmentAdded {
        attachment: Attachment,
    },
    AttachmentDeleted {
        file_id: i64,
        attachment_id: i64,
    },
}

// ── WebSocket handler ────────────────────────────────────────────────

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (sender, receiver) = socket.split();
    let rx = state.ws_tx.subscribe();
    run_socket_loop(sender, receiver, rx).await;
}

/// Core WebSocket loop with ping/pong keepalive.
///
/// Combines broadcast forwarding, client message receiving, and periodic
/// ping/pong health checking into a single select loop. If no Pong is
/// received within [`PONG_TIMEOUT`] after a Ping is sent, the connection
/// is considered dead and the loop exits.
async fn run_socket_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    mut rx: broadcast::Receiver<String>,
) {
    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    // The first tick completes immediately; consume it so the first real
    // ping fires after PING_INTERVAL has elapsed.
    ping_interval.tick().await;

    let mut last_pong = Instant::now();
    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if awaiting_pong && last_pong.elapsed() > PONG_TIMEOUT {
                    // No pong in time, connection is dead
                    break;
                }
                if sender.send(Message::Ping(vec![])).await.is_err() {
                    break;
                }
                awaiting_pong = true;
            }

            result = rx.recv() => {
                match result {
                    Ok(msg) => {
                        if sender.send(Message::Text(msg)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => {
                        // Missed some messages; continue receiving
                        continue;
                    }
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        last_pong = Instant::now();
                        awaiting_pong = false;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {
                        // Ignore other messages from client (Text, Binary, Ping)
                    }
                    Some(Err(_)) => break,
                }
            }
        }
    }

    // Best-effort close frame
    let _ = sender.send(Message::Close(None)).await;
}

// ── Broadcast helper ─────────────────────────────────────────────────

/// Serialize and broadcast a WsMessage to all connected WebSocket clients.
/// Returns silently even if no clients are connected.
pub fn broadcast_message(tx: &broadcast::Sender<String>, msg: &WsMessage) {
    match serde_json::to_string(msg) {
        Ok(json) => {
            let _ = tx.send(json); // Ignore error if no receivers
        }
        Err(e) => {
            tracing::warn!("Failed to serialize WsMessage: {}", e);
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_file() -> File {
        File {
            id: 1,
            file_number: "F-202608-0001".to_string(),
            title: "Budget proposal".to_string(),
            body: "".to_string(),
            kind: FileKind::Letter,
            priority: Priority::Urgent,
            status: FileStatus::Pending,
            created_by: 10,
            assigned_to: Some(20),
            created_at: "2026-08-01T00:00:00Z".to_string(),
            updated_at: "2026-08-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_ws_message_file_created_serialization() {
        let msg = WsMessage::FileCreated { file: sample_file() };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"FileCreated\""));
        assert!(json.contains("\"data\""));
        assert!(json.contains("\"title\":\"Budget proposal\""));
        assert!(json.contains("\"priority\":\"urgent\""));
    }

    #[test]
    fn test_ws_message_status_changed_serialization() {
        let entry = HistoryEntry {
            id: 7,
            file_id: 1,
            action: WorkflowAction::Approve,
            actor_id: 20,
            from_status: FileStatus::Pending,
            to_status: FileStatus::Approved,
            remarks: "".to_string(),
            created_at: "2026-08-02T00:00:00Z".to_string(),
        };
        let msg = WsMessage::StatusChanged {
            file: sample_file(),
            entry,
        };
        let json = serde_json::to_string(&msg).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["type"], "StatusChanged");
        assert_eq!(parsed["data"]["entry"]["action"], "approve");
        assert_eq!(parsed["data"]["entry"]["to_status"], "approved");
    }

    #[test]
    fn test_ws_message_file_deleted_roundtrip() {
        let msg = WsMessage::FileDeleted { file_id: 42 };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"FileDeleted\""));
        let deser: WsMessage = serde_json::from_str(&json).unwrap();
        match deser {
            WsMessage::FileDeleted { file_id } => assert_eq!(file_id, 42),
            _ => panic!("Expected FileDeleted variant"),
        }
    }

    #[test]
    fn test_ws_message_comment_added_serialization() {
        let msg = WsMessage::CommentAdded {
            comment: Comment {
                id: 3,
                file_id: 1,
                author_id: 20,
                body: "Please expedite".to_string(),
                created_at: "2026-08-02T00:00:00Z".to_string(),
            },
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"CommentAdded\""));
        assert!(json.contains("\"Please expedite\""));
    }

    #[tokio::test]
    async fn test_broadcast_channel_delivers_to_subscribers() {
        let (tx, _) = tokio::sync::broadcast::channel::<String>(16);
        let mut rx1 = tx.subscribe();
        let mut rx2 = tx.subscribe();

        let msg = WsMessage::FileDeleted { file_id: 1 };
        broadcast_message(&tx, &msg);

        let received1 = rx1.recv().await.unwrap();
        let received2 = rx2.recv().await.unwrap();

        assert!(received1.contains("FileDeleted"));
        assert_eq!(received1, received2);
    }

    #[tokio::test]
    async fn test_broadcast_no_receivers_does_not_panic() {
        let (tx, _) = tokio::sync::broadcast::channel::<String>(16);
        let msg = WsMessage::FileDeleted { file_id: 1 };
        broadcast_message(&tx, &msg); // Should not panic
    }

    #[test]
    fn test_keepalive_constants() {
        // PONG_TIMEOUT must be greater than PING_INTERVAL so we don't
        // immediately consider a fresh connection dead.
        assert!(PONG_TIMEOUT > PING_INTERVAL);
    }
}
