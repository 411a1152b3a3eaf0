use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use warp::ws::{Message, WebSocket};

use crate::classroom::{ClassroomHandle, ClientMessage, ConnectionId, Inbound, JoinRequest};
use crate::directory::UserDirectory;
use crate::error::{ClassroomError, Result};

pub async fn handle_classroom_websocket(
    websocket: WebSocket,
    classroom: ClassroomHandle,
    directory: Arc<dyn UserDirectory>,
) {
    let connection_id = ConnectionId::generate();
    tracing::info!(connection_id = %connection_id, "New classroom WebSocket connection established");

    let (mut ws_sender, mut ws_receiver) = websocket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    // Spawn task to send messages to client
    let sender_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = ws_sender.send(message).await {
                tracing::error!(error = %e, "Failed to send WebSocket message");
                break;
            }
        }
    });

    if let Err(e) = classroom.connected(connection_id.clone(), tx) {
        tracing::error!(error = %e, "Classroom coordinator unavailable");
        sender_task.abort();
        return;
    }

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(message) if message.is_close() => break,
            Ok(message) => {
                if let Err(e) =
                    handle_websocket_message(&classroom, directory.as_ref(), &connection_id, message)
                        .await
                {
                    tracing::error!(error = %e, "Error handling WebSocket message");
                    break;
                }
            }
            Err(e) => {
                tracing::error!(connection_id = %connection_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    if let Err(e) = classroom.disconnected(connection_id.clone()) {
        tracing::error!(error = %e, "Failed to report disconnect");
    }
    // The coordinator drops its outbox on disconnect, which ends the writer
    // once queued frames are flushed.
    if tokio::time::timeout(std::time::Duration::from_secs(1), sender_task)
        .await
        .is_err()
    {
        tracing::debug!(connection_id = %connection_id, "Writer did not drain in time");
    }
    tracing::info!(connection_id = %connection_id, "Classroom WebSocket connection closed");
}

/// Errors returned here mean the coordinator is gone and the connection
/// should close. Bad frames are answered and do not end the connection.
async fn handle_websocket_message(
    classroom: &ClassroomHandle,
    directory: &dyn UserDirectory,
    connection_id: &ConnectionId,
    message: Message,
) -> Result<()> {
    // binary, ping and pong frames carry no classroom events
    let Ok(text) = message.to_str() else {
        return Ok(());
    };
    tracing::debug!(connection_id = %connection_id, "Received classroom message: {}", text);

    match serde_json::from_str::<ClientMessage>(text) {
        Ok(client_message) => match Inbound::from(client_message) {
            Inbound::Join(request) => join(classroom, directory, connection_id, request).await,
            Inbound::Command(command) => classroom.command(connection_id.clone(), command),
        },
        Err(e) => {
            tracing::warn!(
                connection_id = %connection_id,
                error = %e,
                raw_message = %text,
                "Failed to parse classroom message"
            );
            classroom.rejected(
                connection_id.clone(),
                frame_type(text),
                ClassroomError::invalid_message(e.to_string()),
            )
        }
    }
}

async fn join(
    classroom: &ClassroomHandle,
    directory: &dyn UserDirectory,
    connection_id: &ConnectionId,
    request: JoinRequest,
) -> Result<()> {
    match directory.resolve_user(&request).await {
        Ok(identity) => classroom.join(connection_id.clone(), identity),
        Err(e) => classroom.join_failed(connection_id.clone(), e),
    }
}

/// Best-effort event name of a frame that failed to parse.
fn frame_type(text: &str) -> String {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|value| value.get("type")?.as_str().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}
