use super::commands::{require_joined, CommandProcessor};
use super::lifecycle;
use super::participant::{ConnectionId, Identity};
use super::protocol::{
    unix_millis, ClassroomCommand, ResourceNotice, ServerMessage, SlideProgress, SlideSetProduced,
};
use super::registry::ConnectionRegistry;
use super::relay::{self, Delivery};
use super::state::{ClassroomState, ClassroomStore};
use crate::error::{ClassroomError, Result};

/// Exclusive owner of the registry and the classroom state.
///
/// Every method runs one inbound event to completion and returns the frames
/// it produced. Nothing here awaits, so an event can never observe another
/// event's intermediate state.
#[derive(Debug, Default)]
pub struct Coordinator {
    registry: ConnectionRegistry,
    store: ClassroomStore,
    processor: CommandProcessor,
}

impl Coordinator {
    pub fn new(processor: CommandProcessor) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            store: ClassroomStore::new(),
            processor,
        }
    }

    pub fn join(&mut self, connection_id: ConnectionId, identity: Identity) -> Vec<Delivery> {
        match lifecycle::join(
            &mut self.registry,
            &mut self.store,
            connection_id.clone(),
            identity,
        ) {
            Ok(deliveries) => deliveries,
            Err(e) => vec![Self::join_error(connection_id, &e)],
        }
    }

    /// Surface a failed join (directory miss, missing username) to the
    /// joining connection only.
    pub fn join_error(connection_id: ConnectionId, error: &ClassroomError) -> Delivery {
        tracing::warn!(connection_id = %connection_id, error = %error, "Join rejected");
        Delivery::to(
            connection_id,
            ServerMessage::JoinError {
                code: error.code().to_string(),
                message: error.to_string(),
            },
        )
    }

    pub fn disconnect(&mut self, connection_id: &ConnectionId) -> Vec<Delivery> {
        lifecycle::leave(&mut self.registry, &mut self.store, connection_id)
    }

    pub fn handle_command(
        &mut self,
        connection_id: &ConnectionId,
        command: ClassroomCommand,
    ) -> Vec<Delivery> {
        let command_name = command.name();
        match self.apply_command(connection_id, command) {
            Ok(deliveries) => deliveries,
            Err(e) => vec![Self::rejection(connection_id.clone(), command_name, &e)],
        }
    }

    pub fn rejection(
        connection_id: ConnectionId,
        command: &str,
        error: &ClassroomError,
    ) -> Delivery {
        tracing::warn!(
            connection_id = %connection_id,
            command = command,
            error = %error,
            "Command rejected"
        );
        Delivery::to(
            connection_id,
            ServerMessage::CommandRejected {
                command: command.to_string(),
                code: error.code().to_string(),
                message: error.to_string(),
            },
        )
    }

    fn apply_command(
        &mut self,
        connection_id: &ConnectionId,
        command: ClassroomCommand,
    ) -> Result<Vec<Delivery>> {
        let deliveries = match command {
            ClassroomCommand::ChangeSlide { index } => {
                let slide_number = self.processor.change_slide(
                    &self.registry,
                    &mut self.store,
                    connection_id,
                    index,
                )?;
                tracing::debug!(connection_id = %connection_id, slide_number, "Slide changed");
                vec![Delivery::to_all(ServerMessage::SlideChanged { slide_number })]
            }
            ClassroomCommand::SendMessage { text } => {
                let message = self.processor.post_message(&self.registry, connection_id, &text)?;
                vec![Delivery::to_all(ServerMessage::NewMessage(message))]
            }
            ClassroomCommand::ToggleWhiteboard { mode } => {
                let toggled = self.processor.toggle_whiteboard(
                    &self.registry,
                    &mut self.store,
                    connection_id,
                    mode,
                )?;
                tracing::info!(
                    connection_id = %connection_id,
                    mode = ?toggled.mode,
                    triggered_by = %toggled.triggered_by,
                    "Whiteboard mode changed"
                );
                vec![Delivery::to_others(
                    connection_id.clone(),
                    ServerMessage::WhiteboardToggle {
                        mode: toggled.mode,
                        triggered_by: Some(toggled.triggered_by),
                    },
                )]
            }
            ClassroomCommand::UpdateWhiteboard { delta } => {
                let delta = self.processor.update_whiteboard(
                    &self.registry,
                    &mut self.store,
                    connection_id,
                    delta,
                )?;
                vec![Delivery::to_others(
                    connection_id.clone(),
                    ServerMessage::WhiteboardUpdate {
                        sender_id: connection_id.clone(),
                        delta,
                    },
                )]
            }
            ClassroomCommand::ClearWhiteboard => {
                self.processor
                    .clear_whiteboard(&self.registry, &mut self.store, connection_id)?;
                vec![Delivery::to_others(
                    connection_id.clone(),
                    ServerMessage::WhiteboardClear {
                        sender_id: connection_id.clone(),
                    },
                )]
            }
            ClassroomCommand::Offer { sdp } => {
                require_joined(&self.registry, connection_id)?;
                vec![relay::relay_offer(connection_id, sdp)]
            }
            ClassroomCommand::Answer { target_id, sdp } => {
                require_joined(&self.registry, connection_id)?;
                relay::relay_answer(&self.registry, connection_id, &target_id, sdp)
                    .into_iter()
                    .collect()
            }
            ClassroomCommand::IceCandidate {
                target_id,
                candidate,
            } => {
                require_joined(&self.registry, connection_id)?;
                vec![relay::relay_ice_candidate(
                    &self.registry,
                    connection_id,
                    target_id.as_ref(),
                    candidate,
                )]
            }
        };

        Ok(deliveries)
    }

    /// Install a finished slide deck, then tell everyone the upload completed
    /// and push the refreshed state.
    pub fn apply_slide_set(&mut self, produced: SlideSetProduced) -> Result<(usize, Vec<Delivery>)> {
        if produced.slides.is_empty() {
            return Err(ClassroomError::EmptySlideSet);
        }

        let total_slides = self.store.apply_slide_set(produced.slides);
        tracing::info!(
            classroom_id = ?produced.classroom_id,
            total_slides,
            "Slide set applied"
        );

        let deliveries = vec![
            Delivery::to_all(ServerMessage::UploadComplete {
                classroom_id: produced.classroom_id,
                total_slides,
                timestamp: unix_millis(),
            }),
            Delivery::to_all(ServerMessage::ClassroomState {
                state: self.store.current_snapshot(),
            }),
        ];

        Ok((total_slides, deliveries))
    }

    pub fn slide_progress(&self, progress: SlideProgress) -> Delivery {
        Delivery::to_all(progress.into())
    }

    pub fn resource_notice(&self, notice: ResourceNotice) -> Delivery {
        Delivery::to_all(notice.into())
    }

    pub fn snapshot(&self) -> ClassroomState {
        self.store.current_snapshot()
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classroom::participant::Role;
    use crate::classroom::relay::DeliveryTarget;
    use crate::classroom::state::{Slide, WhiteboardMode};
    use serde_json::json;

    fn identity(username: &str, role: Role) -> Identity {
        Identity {
            username: username.to_string(),
            display_name: username.to_string(),
            role,
        }
    }

    fn deck(count: usize) -> SlideSetProduced {
        SlideSetProduced {
            classroom_id: Some("deck-1".to_string()),
            slides: (0..count)
                .map(|i| Slide {
                    url: format!("/slides/deck-1/slide-{}.webp", i + 1),
                    name: format!("slide-{}.webp", i + 1),
                    index: i,
                })
                .collect(),
        }
    }

    fn classroom() -> (Coordinator, ConnectionId, ConnectionId, ConnectionId) {
        let mut coordinator = Coordinator::default();
        let teacher = ConnectionId::from("t1");
        let s1 = ConnectionId::from("s1");
        let s2 = ConnectionId::from("s2");
        coordinator.join(teacher.clone(), identity("mlee", Role::Teacher));
        coordinator.join(s1.clone(), identity("ana", Role::Student));
        coordinator.join(s2.clone(), identity("ben", Role::Student));
        (coordinator, teacher, s1, s2)
    }

    fn assert_rejected(deliveries: &[Delivery], to: &ConnectionId, code: &str) {
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].target, DeliveryTarget::Unicast(to.clone()));
        match &deliveries[0].message {
            ServerMessage::CommandRejected { code: actual, .. } => assert_eq!(actual, code),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_student_slide_change_is_rejected_privately() {
        let (mut coordinator, _teacher, s1, _s2) = classroom();
        coordinator.apply_slide_set(deck(3)).unwrap();
        let before = coordinator.snapshot();

        let deliveries =
            coordinator.handle_command(&s1, ClassroomCommand::ChangeSlide { index: 1 });

        assert_rejected(&deliveries, &s1, "unauthorized");
        assert_eq!(coordinator.snapshot(), before);
    }

    #[test]
    fn test_teacher_slide_change_broadcasts_to_all() {
        let (mut coordinator, teacher, _s1, _s2) = classroom();
        coordinator.apply_slide_set(deck(3)).unwrap();

        let deliveries =
            coordinator.handle_command(&teacher, ClassroomCommand::ChangeSlide { index: 2 });

        assert_eq!(
            deliveries,
            vec![Delivery::to_all(ServerMessage::SlideChanged { slide_number: 2 })]
        );
        assert_eq!(deliveries[0].recipients(coordinator.registry()).len(), 3);
        assert_eq!(coordinator.snapshot().current_slide_index, 2);
    }

    #[test]
    fn test_out_of_range_slide_change() {
        let (mut coordinator, teacher, _s1, _s2) = classroom();
        coordinator.apply_slide_set(deck(3)).unwrap();

        let deliveries =
            coordinator.handle_command(&teacher, ClassroomCommand::ChangeSlide { index: 5 });

        assert_rejected(&deliveries, &teacher, "out-of-range");
        assert_eq!(coordinator.snapshot().current_slide_index, 0);
    }

    #[test]
    fn test_chat_goes_to_everyone() {
        let (mut coordinator, _teacher, s1, _s2) = classroom();

        let deliveries = coordinator.handle_command(
            &s1,
            ClassroomCommand::SendMessage {
                text: "  question?  ".to_string(),
            },
        );

        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].target, DeliveryTarget::BroadcastAll);
        match &deliveries[0].message {
            ServerMessage::NewMessage(message) => {
                assert_eq!(message.text, "question?");
                assert_eq!(message.sender, "ana");
                assert_eq!(message.role, Role::Student);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_whitespace_chat_rejected() {
        let (mut coordinator, _teacher, s1, _s2) = classroom();
        let deliveries = coordinator.handle_command(
            &s1,
            ClassroomCommand::SendMessage {
                text: "   ".to_string(),
            },
        );
        assert_rejected(&deliveries, &s1, "empty-message");
    }

    #[test]
    fn test_whiteboard_toggle_skips_sender() {
        let (mut coordinator, teacher, s1, s2) = classroom();

        let deliveries = coordinator.handle_command(
            &s1,
            ClassroomCommand::ToggleWhiteboard {
                mode: WhiteboardMode::On,
            },
        );

        assert_eq!(
            deliveries[0].recipients(coordinator.registry()),
            vec![teacher, s2]
        );
        assert_eq!(
            deliveries[0].message,
            ServerMessage::WhiteboardToggle {
                mode: WhiteboardMode::On,
                triggered_by: Some("ana".to_string()),
            }
        );
    }

    #[test]
    fn test_whiteboard_update_skips_author_and_replays_to_joiner() {
        let (mut coordinator, teacher, s1, s2) = classroom();
        coordinator.handle_command(
            &teacher,
            ClassroomCommand::ToggleWhiteboard {
                mode: WhiteboardMode::On,
            },
        );

        let deliveries = coordinator.handle_command(
            &teacher,
            ClassroomCommand::UpdateWhiteboard {
                delta: json!({"strokes": [[0, 0, 4, 4]]}),
            },
        );
        assert_eq!(
            deliveries[0].recipients(coordinator.registry()),
            vec![s1, s2]
        );

        let late = ConnectionId::from("s3");
        let deliveries = coordinator.join(late, identity("cy", Role::Student));
        match &deliveries[0].message {
            ServerMessage::ClassroomJoined { state, .. } => {
                assert_eq!(state.whiteboard_content, Some(json!({"strokes": [[0, 0, 4, 4]]})));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_student_cannot_clear_whiteboard() {
        let (mut coordinator, _teacher, s1, _s2) = classroom();
        let deliveries = coordinator.handle_command(&s1, ClassroomCommand::ClearWhiteboard);
        assert_rejected(&deliveries, &s1, "unauthorized");
    }

    #[test]
    fn test_answer_to_departed_peer_is_silently_dropped() {
        let (mut coordinator, teacher, s1, _s2) = classroom();
        coordinator.disconnect(&teacher);

        let deliveries = coordinator.handle_command(
            &s1,
            ClassroomCommand::Answer {
                target_id: teacher,
                sdp: json!("v=0"),
            },
        );
        assert!(deliveries.is_empty());
    }

    #[test]
    fn test_signaling_requires_join() {
        let (mut coordinator, _teacher, _s1, _s2) = classroom();
        let stranger = ConnectionId::from("stranger");

        let deliveries =
            coordinator.handle_command(&stranger, ClassroomCommand::Offer { sdp: json!("v=0") });
        assert_rejected(&deliveries, &stranger, "not-joined");
    }

    #[test]
    fn test_teacher_departure_broadcasts_once_to_each_remaining() {
        let (mut coordinator, teacher, s1, s2) = classroom();
        coordinator.apply_slide_set(deck(2)).unwrap();

        let deliveries = coordinator.disconnect(&teacher);

        let mut teacher_left_recipients = Vec::new();
        for delivery in &deliveries {
            if matches!(delivery.message, ServerMessage::TeacherLeft {}) {
                teacher_left_recipients.extend(delivery.recipients(coordinator.registry()));
            }
        }
        assert_eq!(teacher_left_recipients, vec![s1, s2]);
        assert_eq!(coordinator.snapshot().total_slides, 0);
        assert!(!coordinator.snapshot().is_teacher_present);
    }

    #[test]
    fn test_roster_matches_registry_after_every_event() {
        let mut coordinator = Coordinator::default();
        let events: Vec<(&str, Option<Role>)> = vec![
            ("s1", Some(Role::Student)),
            ("t1", Some(Role::Teacher)),
            ("s2", Some(Role::Student)),
            ("t1", None),
            ("t2", Some(Role::Teacher)),
            ("s1", None),
            ("t3", Some(Role::Teacher)),
            ("t2", None),
            ("t3", None),
        ];

        for (id, join_as) in events {
            let id = ConnectionId::from(id);
            match join_as {
                Some(role) => {
                    coordinator.join(id, identity("user", role));
                }
                None => {
                    coordinator.disconnect(&id);
                }
            }

            let state = coordinator.snapshot();
            assert_eq!(state.participants, coordinator.registry().snapshot());
            assert_eq!(
                state.is_teacher_present,
                coordinator.registry().has_teacher()
            );
        }
    }

    #[test]
    fn test_apply_slide_set() {
        let (mut coordinator, _teacher, _s1, _s2) = classroom();

        let (total, deliveries) = coordinator.apply_slide_set(deck(4)).unwrap();
        assert_eq!(total, 4);
        assert!(matches!(
            deliveries[0].message,
            ServerMessage::UploadComplete { total_slides: 4, .. }
        ));
        assert!(matches!(
            deliveries[1].message,
            ServerMessage::ClassroomState { .. }
        ));

        assert!(matches!(
            coordinator.apply_slide_set(deck(0)),
            Err(ClassroomError::EmptySlideSet)
        ));
        assert_eq!(coordinator.snapshot().total_slides, 4);
    }

    #[test]
    fn test_collaborator_events_pass_through() {
        let (coordinator, _teacher, _s1, _s2) = classroom();

        let delivery = coordinator.slide_progress(SlideProgress::SlideReady {
            classroom_id: "deck-1".to_string(),
            url: "/slides/deck-1/slide-1.webp".to_string(),
            index: 0,
        });
        assert_eq!(delivery.target, DeliveryTarget::BroadcastAll);
        assert_eq!(
            delivery.message,
            ServerMessage::SlideReady {
                classroom_id: "deck-1".to_string(),
                url: "/slides/deck-1/slide-1.webp".to_string(),
                index: 0,
            }
        );

        let resource = json!({"id": "r1", "name": "notes.pdf", "url": "/resources/r1/notes.pdf"});
        let delivery = coordinator.resource_notice(ResourceNotice::ResourceAdded {
            resource: resource.clone(),
        });
        assert_eq!(delivery.message, ServerMessage::ResourceAdded { resource });
    }
}
