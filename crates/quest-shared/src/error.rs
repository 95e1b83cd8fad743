//! Error types for the progression engine.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuestError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown counter: {0}")]
    UnknownCounter(String),

    #[error("Invalid condition: {0}")]
    InvalidCondition(String),

    #[error("Request is not authenticated")]
    Unauthenticated,

    #[error("Store error: {0}")]
    Store(String),
}

impl QuestError {
    pub fn code(&self) -> i32 {
        match self {
            QuestError::InvalidInput(_) => -32602,
            QuestError::UnknownCounter(_) => -32010,
            QuestError::InvalidCondition(_) => -32011,
            QuestError::Unauthenticated => -32001,
            QuestError::Store(_) => -32603,
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        QuestError::InvalidInput(msg.into())
    }
}

pub type QuestResult<T> = Result<T, QuestError>;
