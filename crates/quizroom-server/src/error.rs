/// Failure taxonomy for lifecycle actions. Every variant is reported only
/// to the acting caller as an `error` event; none mutates room state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    /// Room code unknown, or the caller is not in any room.
    NotFound,
    /// Non-admin attempting an admin-only action.
    Unauthorized,
    /// Action illegal for the current status/rematch combination.
    InvalidState(String),
    /// The 10-player cap is reached.
    Full,
    /// The question-generation call failed.
    Upstream(String),
}

impl std::fmt::Display for GameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "room not found"),
            Self::Unauthorized => write!(f, "only the room admin can do that"),
            Self::InvalidState(m) => write!(f, "{m}"),
            Self::Full => write!(f, "room is full"),
            Self::Upstream(m) => write!(f, "question generation failed: {m}"),
        }
    }
}

impl std::error::Error for GameError {}
