use thiserror::Error;

use crate::flows::FlowTransitionError;

pub const INTERNAL_ERROR_MESSAGE: &str =
    "An unknown error occurred. Please talk to your system administrator for help.";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("quiz named {quiz_id} already exist")]
    AlreadyExists { quiz_id: String },
    #[error("{entity} `{key}` not found")]
    NotFound { entity: &'static str, key: String },
    #[error("no participant could be resolved ({} unresolved)", unresolved.len())]
    PartialFailure { unresolved: Vec<String> },
    #[error(transparent)]
    FlowTransition(#[from] FlowTransitionError),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    pub fn quiz_not_found(quiz_id: &str) -> Self {
        Self::NotFound { entity: "quiz", key: quiz_id.to_owned() }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("document changed since it was read")]
    Conflict,
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("serialization failure: {0}")]
    Serialization(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict)
    }

    /// Text safe to show a chat user. Domain errors carry their own wording.
    pub fn user_message(&self) -> String {
        match self {
            Self::Domain(DomainError::AlreadyExists { .. })
            | Self::Domain(DomainError::NotFound { .. }) => self.to_string(),
            Self::Domain(_)
            | Self::Conflict
            | Self::Persistence(_)
            | Self::Serialization(_)
            | Self::Integration(_)
            | Self::Configuration(_) => INTERNAL_ERROR_MESSAGE.to_owned(),
        }
    }
}
