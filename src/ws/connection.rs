//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection,
//! dispatching incoming commands and forwarding filtered events.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{WsCommand, WsMessage, WsMessageType};
use super::subscription::{SubscriptionManager, parse_targets};
use crate::domain::{MountPointEvent, NodeId};
use crate::service::MountPointManager;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads commands from the client and dispatches them.
/// - Forwards matching events from the [`broadcast::Receiver`] to the client.
pub async fn run_connection(
    socket: WebSocket,
    mut event_rx: broadcast::Receiver<MountPointEvent>,
    manager: Arc<MountPointManager>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new();

    loop {
        tokio::select! {
            // Incoming message from client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let response = handle_text_message(&text, &mut subs, &manager).await;
                        if let Some(resp_json) = response
                            && ws_tx.send(Message::text(resp_json)).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            // Event from EventBus
            event = event_rx.recv() => {
                match event {
                    Ok(mount_event) => {
                        if subs.matches(mount_event.node_id()) {
                            let msg = WsMessage::new(
                                uuid::Uuid::new_v4().to_string(),
                                WsMessageType::Event,
                                serde_json::to_value(&mount_event).unwrap_or_default(),
                            );
                            let json = serde_json::to_string(&msg).unwrap_or_default();
                            if ws_tx.send(Message::text(json)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "ws client lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!("ws connection closed");
}

/// Handles a text message from the client, returning an optional JSON response.
async fn handle_text_message(
    text: &str,
    subs: &mut SubscriptionManager,
    manager: &MountPointManager,
) -> Option<String> {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return serde_json::to_string(&WsMessage::error("", 400, "malformed JSON")).ok();
    };
    let Ok(command) = serde_json::from_value::<WsCommand>(msg.payload) else {
        return serde_json::to_string(&WsMessage::error(msg.id, 404, "unknown command")).ok();
    };

    let payload = match command {
        WsCommand::Subscribe { node_ids } => {
            let (ids, wildcard) = parse_targets(&node_ids);
            subs.subscribe(&ids, wildcard);
            serde_json::json!({
                "subscribed": ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "count": subs.count(),
                "wildcard": subs.is_subscribed_all(),
            })
        }
        WsCommand::Unsubscribe { node_ids } => {
            let (ids, wildcard) = parse_targets(&node_ids);
            subs.unsubscribe(&ids, wildcard);
            serde_json::json!({
                "unsubscribed": ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "remaining_count": subs.count(),
                "wildcard": subs.is_subscribed_all(),
            })
        }
        WsCommand::ListMountPoints => {
            let mount_points = manager.list().await;
            serde_json::json!({ "mount_points": mount_points })
        }
        WsCommand::GetMountPoint { node_id } => match manager.get(&NodeId::new(&node_id)).await {
            Some(summary) => serde_json::to_value(&summary).unwrap_or_default(),
            None => {
                let message = format!("mount point not found: {node_id}");
                return serde_json::to_string(&WsMessage::error(msg.id, 404, &message)).ok();
            }
        },
    };

    let response = WsMessage::new(msg.id, WsMessageType::Response, payload);
    serde_json::to_string(&response).ok()
}
