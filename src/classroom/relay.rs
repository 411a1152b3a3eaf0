use serde_json::Value;

use super::participant::ConnectionId;
use super::protocol::ServerMessage;
use super::registry::ConnectionRegistry;

/// Who receives an outbound frame. Chosen once per event and resolved
/// against the registry at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryTarget {
    Unicast(ConnectionId),
    BroadcastExceptSender,
    BroadcastAll,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// Connection whose event produced this frame, `None` for collaborator events.
    pub origin: Option<ConnectionId>,
    pub target: DeliveryTarget,
    pub message: ServerMessage,
}

impl Delivery {
    pub fn to(connection_id: ConnectionId, message: ServerMessage) -> Self {
        Self {
            origin: None,
            target: DeliveryTarget::Unicast(connection_id),
            message,
        }
    }

    pub fn to_all(message: ServerMessage) -> Self {
        Self {
            origin: None,
            target: DeliveryTarget::BroadcastAll,
            message,
        }
    }

    pub fn to_others(origin: ConnectionId, message: ServerMessage) -> Self {
        Self {
            origin: Some(origin),
            target: DeliveryTarget::BroadcastExceptSender,
            message,
        }
    }

    /// Connections this frame goes to, in roster order for broadcasts.
    ///
    /// Unicast resolves even for connections that have not joined yet, so
    /// join errors reach the connection that caused them.
    pub fn recipients(&self, registry: &ConnectionRegistry) -> Vec<ConnectionId> {
        match &self.target {
            DeliveryTarget::Unicast(id) => vec![id.clone()],
            DeliveryTarget::BroadcastAll => {
                registry.iter().map(|p| p.connection_id.clone()).collect()
            }
            DeliveryTarget::BroadcastExceptSender => registry
                .iter()
                .map(|p| &p.connection_id)
                .filter(|id| Some(*id) != self.origin.as_ref())
                .cloned()
                .collect(),
        }
    }
}

/// Offers always fan out: one teacher, many students each completing an
/// independent peer connection.
pub fn relay_offer(sender: &ConnectionId, sdp: Value) -> Delivery {
    tracing::debug!(sender_id = %sender, "Relaying WebRTC offer");
    Delivery::to_others(
        sender.clone(),
        ServerMessage::WebrtcOffer {
            sender_id: sender.clone(),
            sdp,
        },
    )
}

/// Answers go to exactly one peer. A target that already left is dropped
/// without error since it may have disconnected mid-handshake.
pub fn relay_answer(
    registry: &ConnectionRegistry,
    sender: &ConnectionId,
    target: &ConnectionId,
    sdp: Value,
) -> Option<Delivery> {
    if !registry.contains(target) {
        tracing::debug!(
            sender_id = %sender,
            target_id = %target,
            "Dropping WebRTC answer for disconnected target"
        );
        return None;
    }

    tracing::debug!(sender_id = %sender, target_id = %target, "Relaying WebRTC answer");
    Some(Delivery {
        origin: Some(sender.clone()),
        target: DeliveryTarget::Unicast(target.clone()),
        message: ServerMessage::WebrtcAnswer {
            sender_id: sender.clone(),
            sdp,
        },
    })
}

/// ICE candidates are unicast when the target is live, otherwise they fall
/// back to every peer except the sender.
pub fn relay_ice_candidate(
    registry: &ConnectionRegistry,
    sender: &ConnectionId,
    target: Option<&ConnectionId>,
    candidate: Value,
) -> Delivery {
    let message = ServerMessage::WebrtcIceCandidate {
        sender_id: sender.clone(),
        candidate,
    };

    match target.filter(|id| registry.contains(id)) {
        Some(target) => Delivery {
            origin: Some(sender.clone()),
            target: DeliveryTarget::Unicast(target.clone()),
            message,
        },
        None => Delivery::to_others(sender.clone(), message),
    }
}
