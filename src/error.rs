use crate::store::StoreError;

/// Result type for state machine operations
pub type GameResult<T> = Result<T, GameError>;

/// Errors surfaced to callers of the state machine
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("You already have {0} games in progress")]
    QuotaExceeded(usize),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl GameError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
