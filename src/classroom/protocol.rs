use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::participant::{ConnectionId, Participant, Role};
use super::state::{ClassroomState, Slide, WhiteboardMode};

/// Frames a client may send over its classroom socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Join {
        username: String,
        #[serde(default)]
        role: Option<Role>,
        #[serde(default, alias = "name")]
        display_name: Option<String>,
    },

    ChangeSlide {
        #[serde(alias = "slideNumber")]
        index: i64,
    },

    SendMessage {
        text: String,
    },

    WhiteboardToggle {
        mode: WhiteboardMode,
    },

    WhiteboardUpdate {
        #[serde(alias = "update")]
        delta: Value,
    },

    WhiteboardClear {},

    WebrtcOffer {
        #[serde(alias = "offer")]
        sdp: Value,
    },

    WebrtcAnswer {
        #[serde(alias = "to")]
        target_id: ConnectionId,
        #[serde(alias = "answer")]
        sdp: Value,
    },

    WebrtcIceCandidate {
        #[serde(default, alias = "to")]
        target_id: Option<ConnectionId>,
        candidate: Value,
    },
}

/// Identity claimed by a connection when it asks to join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub username: String,
    pub role: Option<Role>,
    pub display_name: Option<String>,
}

/// State-changing and signaling commands from an already joined connection.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassroomCommand {
    ChangeSlide { index: i64 },
    SendMessage { text: String },
    ToggleWhiteboard { mode: WhiteboardMode },
    UpdateWhiteboard { delta: Value },
    ClearWhiteboard,
    Offer { sdp: Value },
    Answer { target_id: ConnectionId, sdp: Value },
    IceCandidate { target_id: Option<ConnectionId>, candidate: Value },
}

impl ClassroomCommand {
    /// Event name echoed back in `command-rejected`.
    pub fn name(&self) -> &'static str {
        match self {
            ClassroomCommand::ChangeSlide { .. } => "change-slide",
            ClassroomCommand::SendMessage { .. } => "send-message",
            ClassroomCommand::ToggleWhiteboard { .. } => "whiteboard-toggle",
            ClassroomCommand::UpdateWhiteboard { .. } => "whiteboard-update",
            ClassroomCommand::ClearWhiteboard => "whiteboard-clear",
            ClassroomCommand::Offer { .. } => "webrtc-offer",
            ClassroomCommand::Answer { .. } => "webrtc-answer",
            ClassroomCommand::IceCandidate { .. } => "webrtc-ice-candidate",
        }
    }
}

pub enum Inbound {
    Join(JoinRequest),
    Command(ClassroomCommand),
}

impl From<ClientMessage> for Inbound {
    fn from(message: ClientMessage) -> Self {
        match message {
            ClientMessage::Join {
                username,
                role,
                display_name,
            } => Inbound::Join(JoinRequest {
                username,
                role,
                display_name,
            }),
            ClientMessage::ChangeSlide { index } => {
                Inbound::Command(ClassroomCommand::ChangeSlide { index })
            }
            ClientMessage::SendMessage { text } => {
                Inbound::Command(ClassroomCommand::SendMessage { text })
            }
            ClientMessage::WhiteboardToggle { mode } => {
                Inbound::Command(ClassroomCommand::ToggleWhiteboard { mode })
            }
            ClientMessage::WhiteboardUpdate { delta } => {
                Inbound::Command(ClassroomCommand::UpdateWhiteboard { delta })
            }
            ClientMessage::WhiteboardClear {} => Inbound::Command(ClassroomCommand::ClearWhiteboard),
            ClientMessage::WebrtcOffer { sdp } => Inbound::Command(ClassroomCommand::Offer { sdp }),
            ClientMessage::WebrtcAnswer { target_id, sdp } => {
                Inbound::Command(ClassroomCommand::Answer { target_id, sdp })
            }
            ClientMessage::WebrtcIceCandidate {
                target_id,
                candidate,
            } => Inbound::Command(ClassroomCommand::IceCandidate {
                target_id,
                candidate,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub sender: String,
    pub sender_id: ConnectionId,
    pub role: Role,
    pub text: String,
    pub timestamp: u64,
}

/// Frames the server pushes to connected clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    ClassroomJoined {
        connection_id: ConnectionId,
        you: Participant,
        state: ClassroomState,
    },

    JoinError {
        code: String,
        message: String,
    },

    ParticipantsUpdated {
        participants: Vec<Participant>,
    },

    SlideChanged {
        slide_number: usize,
    },

    NewMessage(ChatMessage),

    WhiteboardToggle {
        mode: WhiteboardMode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        triggered_by: Option<String>,
    },

    WhiteboardUpdate {
        sender_id: ConnectionId,
        delta: Value,
    },

    WhiteboardClear {
        sender_id: ConnectionId,
    },

    WebrtcOffer {
        sender_id: ConnectionId,
        sdp: Value,
    },

    WebrtcAnswer {
        sender_id: ConnectionId,
        sdp: Value,
    },

    WebrtcIceCandidate {
        sender_id: ConnectionId,
        candidate: Value,
    },

    TeacherLeft {},

    CommandRejected {
        command: String,
        code: String,
        message: String,
    },

    ClassroomState {
        state: ClassroomState,
    },

    UploadStarted {
        classroom_id: String,
        filename: String,
        timestamp: u64,
    },

    TotalSlides {
        classroom_id: String,
        total_slides: usize,
    },

    SlideReady {
        classroom_id: String,
        url: String,
        index: usize,
    },

    UploadComplete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        classroom_id: Option<String>,
        total_slides: usize,
        timestamp: u64,
    },

    ResourceAdded {
        resource: Value,
    },

    ResourceRemoved {
        resource: Value,
    },
}

/// Completed output of the slide conversion pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideSetProduced {
    #[serde(default)]
    pub classroom_id: Option<String>,
    pub slides: Vec<Slide>,
}

/// Incremental conversion progress, relayed to clients as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum SlideProgress {
    UploadStarted {
        classroom_id: String,
        filename: String,
        #[serde(default = "unix_millis")]
        timestamp: u64,
    },

    TotalSlides {
        classroom_id: String,
        total_slides: usize,
    },

    SlideReady {
        classroom_id: String,
        url: String,
        index: usize,
    },
}

impl From<SlideProgress> for ServerMessage {
    fn from(progress: SlideProgress) -> Self {
        match progress {
            SlideProgress::UploadStarted {
                classroom_id,
                filename,
                timestamp,
            } => ServerMessage::UploadStarted {
                classroom_id,
                filename,
                timestamp,
            },
            SlideProgress::TotalSlides {
                classroom_id,
                total_slides,
            } => ServerMessage::TotalSlides {
                classroom_id,
                total_slides,
            },
            SlideProgress::SlideReady {
                classroom_id,
                url,
                index,
            } => ServerMessage::SlideReady {
                classroom_id,
                url,
                index,
            },
        }
    }
}

/// Resource store notification. The coordinator keeps no resource state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ResourceNotice {
    ResourceAdded { resource: Value },
    ResourceRemoved { resource: Value },
}

impl From<ResourceNotice> for ServerMessage {
    fn from(notice: ResourceNotice) -> Self {
        match notice {
            ResourceNotice::ResourceAdded { resource } => ServerMessage::ResourceAdded { resource },
            ResourceNotice::ResourceRemoved { resource } => {
                ServerMessage::ResourceRemoved { resource }
            }
        }
    }
}

pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
