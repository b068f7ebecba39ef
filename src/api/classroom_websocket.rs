use std::sync::Arc;
use tokio::sync::mpsc;
use warp::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};

use crate::classroom::{ClassroomGateway, ClientEvent, ServerEvent};
use crate::config::WebSocketConfig;

pub async fn handle_classroom_websocket(
    websocket: WebSocket,
    gateway: Arc<ClassroomGateway>,
    ws_config: WebSocketConfig,
) {
    let (mut ws_sender, mut ws_receiver) = websocket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    let connection_id = gateway.connect(tx).await;

    // Single writer per connection keeps outbound order equal to emission order.
    let writer_id = connection_id.clone();
    let sender_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(ws_config.heartbeat_interval);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    let text = match event.encode() {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::error!(connection_id = %writer_id, error = %e, "Failed to serialize server event");
                            continue;
                        }
                    };
                    if let Err(e) = ws_sender.send(Message::text(text)).await {
                        tracing::debug!(connection_id = %writer_id, error = %e, "Failed to send WebSocket message");
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if let Err(e) = ws_sender.send(Message::ping(Vec::new())).await {
                        tracing::debug!(connection_id = %writer_id, error = %e, "Heartbeat failed");
                        break;
                    }
                }
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(message) => {
                if message.is_close() {
                    break;
                }
                handle_websocket_message(&gateway, &connection_id, message).await;
            }
            Err(e) => {
                tracing::warn!(connection_id = %connection_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    gateway.disconnect(&connection_id).await;
    sender_task.abort();
    tracing::info!(connection_id = %connection_id, "Classroom WebSocket connection closed");
}

async fn handle_websocket_message(gateway: &ClassroomGateway, connection_id: &str, message: Message) {
    // Pings, pongs and binary frames carry no classroom events.
    let Ok(text) = message.to_str() else {
        return;
    };

    match ClientEvent::decode(text) {
        Ok(event) => gateway.handle_event(connection_id, event).await,
        Err(e) => {
            tracing::error!(
                connection_id = %connection_id,
                error = %e,
                raw_message = %text,
                "Failed to parse classroom message"
            );
        }
    }
}
