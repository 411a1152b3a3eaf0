use thiserror::Error;

/// Error types for the classroom coordinator
#[derive(Debug, Error)]
pub enum ClassroomError {
    /// Membership errors
    #[error("Connection {0} is already registered")]
    DuplicateConnection(String),

    #[error("User {0} not found")]
    UserNotFound(String),

    #[error("Username required")]
    UsernameRequired,

    #[error("Connection {0} has not joined the classroom")]
    NotJoined(String),

    #[error("User directory unavailable: {0}")]
    UserDirectory(String),

    /// Command errors
    #[error("Connection {0} not authorized for this operation")]
    Unauthorized(String),

    #[error("Slide index {index} out of range (total slides: {total})")]
    OutOfRange { index: i64, total: usize },

    #[error("Message text is empty")]
    EmptyMessage,

    #[error("Whiteboard is off")]
    WhiteboardInactive,

    /// Slide producer errors
    #[error("Slide set contains no slides")]
    EmptySlideSet,

    /// Wire errors
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Failed to serialize message: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Generic errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Convenience type alias for Results using ClassroomError
pub type Result<T> = std::result::Result<T, ClassroomError>;

impl ClassroomError {
    /// Helper to create Internal errors with context
    pub fn internal(msg: impl Into<String>) -> Self {
        ClassroomError::Internal(msg.into())
    }

    /// Helper to create boundary validation errors
    pub fn invalid_message(msg: impl Into<String>) -> Self {
        ClassroomError::InvalidMessage(msg.into())
    }

    /// Stable code sent to clients in `join-error` and `command-rejected`
    pub fn code(&self) -> &'static str {
        match self {
            ClassroomError::DuplicateConnection(_) => "duplicate-connection",
            ClassroomError::UserNotFound(_) => "user-not-found",
            ClassroomError::UsernameRequired => "username-required",
            ClassroomError::NotJoined(_) => "not-joined",
            ClassroomError::UserDirectory(_) => "user-directory-unavailable",
            ClassroomError::Unauthorized(_) => "unauthorized",
            ClassroomError::OutOfRange { .. } => "out-of-range",
            ClassroomError::EmptyMessage => "empty-message",
            ClassroomError::WhiteboardInactive => "whiteboard-inactive",
            ClassroomError::EmptySlideSet => "empty-slide-set",
            ClassroomError::InvalidMessage(_) => "invalid-message",
            ClassroomError::SerializationFailed(_) => "serialization-failed",
            ClassroomError::InvalidConfiguration(_) => "invalid-configuration",
            ClassroomError::Internal(_) => "internal",
        }
    }
}
