use serde_json::Value;

use super::participant::{ConnectionId, Participant};
use super::protocol::{unix_millis, ChatMessage};
use super::registry::ConnectionRegistry;
use super::state::{ClassroomStore, WhiteboardMode};
use crate::config::DEFAULT_MAX_MESSAGE_LENGTH;
use crate::error::{ClassroomError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct WhiteboardToggled {
    pub mode: WhiteboardMode,
    pub triggered_by: String,
}

/// Validates and applies state-changing commands.
///
/// Slide navigation and drawing belong to the teacher; chat and showing or
/// hiding the shared canvas are open to everyone who joined. A failed
/// command never mutates the store.
#[derive(Debug, Clone)]
pub struct CommandProcessor {
    max_message_length: usize,
}

impl Default for CommandProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_LENGTH)
    }
}

impl CommandProcessor {
    pub fn new(max_message_length: usize) -> Self {
        Self { max_message_length }
    }

    pub fn change_slide(
        &self,
        registry: &ConnectionRegistry,
        store: &mut ClassroomStore,
        connection_id: &ConnectionId,
        index: i64,
    ) -> Result<usize> {
        require_teacher(registry, connection_id)?;
        store.set_current_slide(index)
    }

    pub fn post_message(
        &self,
        registry: &ConnectionRegistry,
        connection_id: &ConnectionId,
        text: &str,
    ) -> Result<ChatMessage> {
        let participant = require_joined(registry, connection_id)?;

        let text = text.trim();
        if text.is_empty() {
            return Err(ClassroomError::EmptyMessage);
        }

        Ok(ChatMessage {
            sender: participant.display_name.clone(),
            sender_id: participant.connection_id.clone(),
            role: participant.role,
            text: truncate_chars(text, self.max_message_length),
            timestamp: unix_millis(),
        })
    }

    pub fn toggle_whiteboard(
        &self,
        registry: &ConnectionRegistry,
        store: &mut ClassroomStore,
        connection_id: &ConnectionId,
        mode: WhiteboardMode,
    ) -> Result<WhiteboardToggled> {
        let participant = require_joined(registry, connection_id)?;
        store.set_whiteboard_mode(mode);

        Ok(WhiteboardToggled {
            mode,
            triggered_by: participant.display_name.clone(),
        })
    }

    pub fn update_whiteboard(
        &self,
        registry: &ConnectionRegistry,
        store: &mut ClassroomStore,
        connection_id: &ConnectionId,
        delta: Value,
    ) -> Result<Value> {
        require_teacher(registry, connection_id)?;
        store.set_whiteboard_content(delta.clone())?;
        Ok(delta)
    }

    pub fn clear_whiteboard(
        &self,
        registry: &ConnectionRegistry,
        store: &mut ClassroomStore,
        connection_id: &ConnectionId,
    ) -> Result<()> {
        require_teacher(registry, connection_id)?;
        store.clear_whiteboard();
        Ok(())
    }
}

pub(crate) fn require_joined<'a>(
    registry: &'a ConnectionRegistry,
    connection_id: &ConnectionId,
) -> Result<&'a Participant> {
    registry
        .lookup(connection_id)
        .ok_or_else(|| ClassroomError::NotJoined(connection_id.to_string()))
}

fn require_teacher<'a>(
    registry: &'a ConnectionRegistry,
    connection_id: &ConnectionId,
) -> Result<&'a Participant> {
    let participant = require_joined(registry, connection_id)?;
    if !participant.role.is_teacher() {
        return Err(ClassroomError::Unauthorized(connection_id.to_string()));
    }
    Ok(participant)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}
