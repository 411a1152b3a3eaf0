use super::participant::{ConnectionId, Identity};
use super::protocol::ServerMessage;
use super::registry::ConnectionRegistry;
use super::relay::Delivery;
use super::state::{ClassroomStore, WhiteboardMode};
use crate::error::Result;

/// `Joining -> Joined`.
///
/// The joiner gets a catch-up snapshot first, then everyone (joiner included)
/// gets the new roster, so the joiner is consistent before other clients
/// reconcile.
pub fn join(
    registry: &mut ConnectionRegistry,
    store: &mut ClassroomStore,
    connection_id: ConnectionId,
    identity: Identity,
) -> Result<Vec<Delivery>> {
    let participant = registry.register(
        connection_id.clone(),
        identity.username,
        identity.display_name,
        identity.role,
    )?;
    store.sync_roster(registry.snapshot());

    tracing::info!(
        connection_id = %connection_id,
        username = %participant.username,
        role = %participant.role,
        participants = registry.len(),
        "Participant joined classroom"
    );

    Ok(vec![
        Delivery::to(
            connection_id.clone(),
            ServerMessage::ClassroomJoined {
                connection_id,
                you: participant,
                state: store.current_snapshot(),
            },
        ),
        roster_update(store),
    ])
}

/// `Joined -> Disconnected`.
///
/// When the last teacher leaves the session is torn down in the same step:
/// the store resets, remaining participants are told the teacher left and
/// that the whiteboard is closed, then the roster is re-sent.
pub fn leave(
    registry: &mut ConnectionRegistry,
    store: &mut ClassroomStore,
    connection_id: &ConnectionId,
) -> Vec<Delivery> {
    let Some(participant) = registry.remove(connection_id) else {
        return Vec::new();
    };
    store.sync_roster(registry.snapshot());

    let mut deliveries = Vec::new();

    if participant.role.is_teacher() && !store.is_teacher_present() {
        store.reset_for_teacher_departure();

        tracing::info!(
            connection_id = %connection_id,
            username = %participant.username,
            "Last teacher left, classroom reset"
        );

        deliveries.push(Delivery::to_others(
            connection_id.clone(),
            ServerMessage::TeacherLeft {},
        ));
        deliveries.push(Delivery::to_others(
            connection_id.clone(),
            ServerMessage::WhiteboardToggle {
                mode: WhiteboardMode::Off,
                triggered_by: None,
            },
        ));
    } else {
        tracing::info!(
            connection_id = %connection_id,
            username = %participant.username,
            role = %participant.role,
            "Participant left classroom"
        );
    }

    deliveries.push(roster_update(store));
    deliveries
}

fn roster_update(store: &ClassroomStore) -> Delivery {
    Delivery::to_all(ServerMessage::ParticipantsUpdated {
        participants: store.participants().to_vec(),
    })
}
