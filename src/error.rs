use thiserror::Error;

/// Custom error types for the classroom server
#[derive(Debug, Error)]
pub enum ClassroomError {
    /// Room and participant errors
    #[error("Classroom {0} not found")]
    RoomNotFound(String),

    #[error("Classroom {0} already exists")]
    RoomAlreadyExists(String),

    #[error("Participant {0} not found")]
    ParticipantNotFound(String),

    #[error("Connection {0} is not the owner of this classroom")]
    Unauthorized(String),

    #[error("Owner connection {0} cannot remove itself")]
    CannotRemoveOwner(String),

    #[error("Connection {0} has no edit permission")]
    PermissionDenied(String),

    /// Protocol errors
    #[error("Invalid classroom message: {0}")]
    InvalidMessage(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigurationParseFailed(String),

    /// Network errors
    #[error("Failed to bind server: {0}")]
    Bind(#[from] warp::Error),
}

/// Convenience type alias for Results using ClassroomError
pub type Result<T> = std::result::Result<T, ClassroomError>;

impl ClassroomError {
    /// True for errors caused by a stale or unknown room id
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClassroomError::RoomNotFound(_))
    }
}
