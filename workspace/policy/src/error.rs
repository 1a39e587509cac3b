use thiserror::Error;

/// Error types for the policy crate
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// The actor is not allowed to act on the participant
    #[error("user '{username}' may not manage participant {participant_id}")]
    NotPermitted {
        username: String,
        participant_id: i32,
    },

    /// A survey score outside the accepted range
    #[error("score {0} is outside the range 0-10")]
    ScoreOutOfRange(i32),

    /// A stored user level code that maps to no role
    #[error("unknown user level '{0}'")]
    UnknownLevel(String),
}

/// Type alias for Result with PolicyError
pub type Result<T> = std::result::Result<T, PolicyError>;
