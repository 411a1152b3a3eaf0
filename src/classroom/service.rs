use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use warp::ws::Message;

use super::commands::CommandProcessor;
use super::coordinator::Coordinator;
use super::participant::{ConnectionId, Identity};
use super::protocol::{ClassroomCommand, ResourceNotice, SlideProgress, SlideSetProduced};
use super::relay::Delivery;
use super::state::ClassroomState;
use crate::error::{ClassroomError, Result};

/// Sending half of a connection's socket writer.
pub type Outbox = mpsc::UnboundedSender<Message>;

/// Events consumed by the coordinator task, one at a time, in arrival order.
#[derive(Debug)]
pub enum CoordinatorEvent {
    Connected {
        connection_id: ConnectionId,
        outbox: Outbox,
    },
    Join {
        connection_id: ConnectionId,
        identity: Identity,
    },
    JoinFailed {
        connection_id: ConnectionId,
        error: ClassroomError,
    },
    Command {
        connection_id: ConnectionId,
        command: ClassroomCommand,
    },
    Rejected {
        connection_id: ConnectionId,
        command: String,
        error: ClassroomError,
    },
    Disconnected {
        connection_id: ConnectionId,
    },
    SlideSetProduced {
        produced: SlideSetProduced,
        reply: oneshot::Sender<Result<usize>>,
    },
    SlideProgress(SlideProgress),
    Resource(ResourceNotice),
    Snapshot {
        reply: oneshot::Sender<ClassroomState>,
    },
}

/// Cloneable entry point to the coordinator task.
#[derive(Debug, Clone)]
pub struct ClassroomHandle {
    sender: mpsc::UnboundedSender<CoordinatorEvent>,
}

impl ClassroomHandle {
    /// Spawns the coordinator task and returns a handle to it. The task stops
    /// once every handle is dropped.
    pub fn spawn(processor: CommandProcessor) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let service = ClassroomService {
            coordinator: Coordinator::new(processor),
            outboxes: HashMap::new(),
        };
        tokio::spawn(service.run(receiver));
        Self { sender }
    }

    fn send(&self, event: CoordinatorEvent) -> Result<()> {
        self.sender
            .send(event)
            .map_err(|_| ClassroomError::internal("classroom coordinator stopped"))
    }

    pub fn connected(&self, connection_id: ConnectionId, outbox: Outbox) -> Result<()> {
        self.send(CoordinatorEvent::Connected {
            connection_id,
            outbox,
        })
    }

    pub fn join(&self, connection_id: ConnectionId, identity: Identity) -> Result<()> {
        self.send(CoordinatorEvent::Join {
            connection_id,
            identity,
        })
    }

    pub fn join_failed(&self, connection_id: ConnectionId, error: ClassroomError) -> Result<()> {
        self.send(CoordinatorEvent::JoinFailed {
            connection_id,
            error,
        })
    }

    pub fn command(&self, connection_id: ConnectionId, command: ClassroomCommand) -> Result<()> {
        self.send(CoordinatorEvent::Command {
            connection_id,
            command,
        })
    }

    /// Report a frame that failed boundary validation back to its sender.
    pub fn rejected(
        &self,
        connection_id: ConnectionId,
        command: impl Into<String>,
        error: ClassroomError,
    ) -> Result<()> {
        self.send(CoordinatorEvent::Rejected {
            connection_id,
            command: command.into(),
            error,
        })
    }

    pub fn disconnected(&self, connection_id: ConnectionId) -> Result<()> {
        self.send(CoordinatorEvent::Disconnected { connection_id })
    }

    pub async fn apply_slide_set(&self, produced: SlideSetProduced) -> Result<usize> {
        let (reply, response) = oneshot::channel();
        self.send(CoordinatorEvent::SlideSetProduced { produced, reply })?;
        response
            .await
            .map_err(|_| ClassroomError::internal("classroom coordinator stopped"))?
    }

    pub fn slide_progress(&self, progress: SlideProgress) -> Result<()> {
        self.send(CoordinatorEvent::SlideProgress(progress))
    }

    pub fn resource_notice(&self, notice: ResourceNotice) -> Result<()> {
        self.send(CoordinatorEvent::Resource(notice))
    }

    pub async fn snapshot(&self) -> Result<ClassroomState> {
        let (reply, response) = oneshot::channel();
        self.send(CoordinatorEvent::Snapshot { reply })?;
        response
            .await
            .map_err(|_| ClassroomError::internal("classroom coordinator stopped"))
    }
}

struct ClassroomService {
    coordinator: Coordinator,
    outboxes: HashMap<ConnectionId, Outbox>,
}

impl ClassroomService {
    async fn run(mut self, mut receiver: mpsc::UnboundedReceiver<CoordinatorEvent>) {
        tracing::info!("Classroom coordinator started");

        while let Some(event) = receiver.recv().await {
            self.handle_event(event);
        }

        tracing::info!("Classroom coordinator stopped");
    }

    fn handle_event(&mut self, event: CoordinatorEvent) {
        let deliveries = match event {
            CoordinatorEvent::Connected {
                connection_id,
                outbox,
            } => {
                tracing::debug!(connection_id = %connection_id, "Connection opened");
                self.outboxes.insert(connection_id, outbox);
                Vec::new()
            }
            CoordinatorEvent::Join {
                connection_id,
                identity,
            } => self.coordinator.join(connection_id, identity),
            CoordinatorEvent::JoinFailed {
                connection_id,
                error,
            } => vec![Coordinator::join_error(connection_id, &error)],
            CoordinatorEvent::Command {
                connection_id,
                command,
            } => self.coordinator.handle_command(&connection_id, command),
            CoordinatorEvent::Rejected {
                connection_id,
                command,
                error,
            } => vec![Coordinator::rejection(connection_id, &command, &error)],
            CoordinatorEvent::Disconnected { connection_id } => {
                self.outboxes.remove(&connection_id);
                self.coordinator.disconnect(&connection_id)
            }
            CoordinatorEvent::SlideSetProduced { produced, reply } => {
                match self.coordinator.apply_slide_set(produced) {
                    Ok((total, deliveries)) => {
                        let _ = reply.send(Ok(total));
                        deliveries
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e));
                        Vec::new()
                    }
                }
            }
            CoordinatorEvent::SlideProgress(progress) => {
                vec![self.coordinator.slide_progress(progress)]
            }
            CoordinatorEvent::Resource(notice) => vec![self.coordinator.resource_notice(notice)],
            CoordinatorEvent::Snapshot { reply } => {
                let _ = reply.send(self.coordinator.snapshot());
                Vec::new()
            }
        };

        for delivery in deliveries {
            self.dispatch(delivery);
        }
    }

    fn dispatch(&self, delivery: Delivery) {
        let text = match serde_json::to_string(&delivery.message) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize outbound message");
                return;
            }
        };

        for connection_id in delivery.recipients(self.coordinator.registry()) {
            match self.outboxes.get(&connection_id) {
                Some(outbox) => {
                    if outbox.send(Message::text(text.clone())).is_err() {
                        tracing::debug!(
                            connection_id = %connection_id,
                            "Outbox closed, dropping message"
                        );
                    }
                }
                None => {
                    tracing::debug!(
                        connection_id = %connection_id,
                        "No outbox for recipient, dropping message"
                    );
                }
            }
        }
    }
}
