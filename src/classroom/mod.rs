pub mod commands;
pub mod coordinator;
pub mod lifecycle;
pub mod participant;
pub mod protocol;
pub mod registry;
pub mod relay;
pub mod service;
pub mod state;

pub use commands::CommandProcessor;
pub use coordinator::Coordinator;
pub use participant::{ConnectionId, Identity, Participant, Role};
pub use protocol::{
    ClassroomCommand, ClientMessage, Inbound, JoinRequest, ResourceNotice, ServerMessage,
    SlideProgress, SlideSetProduced,
};
pub use registry::ConnectionRegistry;
pub use relay::{Delivery, DeliveryTarget};
pub use service::{ClassroomHandle, Outbox};
pub use state::{ClassroomState, ClassroomStore, Slide, WhiteboardMode};
