use std::collections::HashMap;

use super::participant::{ConnectionId, Participant, Role};
use crate::error::{ClassroomError, Result};

/// Live connections and the identity each one joined with.
///
/// The connection id is the only identity key; several connections may share
/// a username (one person with two tabs open). Broadcasting is the caller's
/// business, this type only keeps the map.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    participants: HashMap<ConnectionId, Participant>,
    order: Vec<ConnectionId>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        connection_id: ConnectionId,
        username: String,
        display_name: String,
        role: Role,
    ) -> Result<Participant> {
        if self.participants.contains_key(&connection_id) {
            return Err(ClassroomError::DuplicateConnection(connection_id.to_string()));
        }

        let participant = Participant {
            connection_id: connection_id.clone(),
            username,
            display_name,
            role,
        };

        self.order.push(connection_id.clone());
        self.participants.insert(connection_id, participant.clone());

        Ok(participant)
    }

    pub fn lookup(&self, connection_id: &ConnectionId) -> Option<&Participant> {
        self.participants.get(connection_id)
    }

    pub fn remove(&mut self, connection_id: &ConnectionId) -> Option<Participant> {
        let participant = self.participants.remove(connection_id)?;
        self.order.retain(|id| id != connection_id);
        Some(participant)
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.participants.contains_key(connection_id)
    }

    /// All live participants in registration order.
    pub fn snapshot(&self) -> Vec<Participant> {
        self.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.order.iter().filter_map(|id| self.participants.get(id))
    }

    pub fn has_teacher(&self) -> bool {
        self.participants.values().any(|p| p.role.is_teacher())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
