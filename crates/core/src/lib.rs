pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod reveal;

pub use domain::quiz::{Answer, Question, Quiz, QuizDocument, QuizId, UserId};
pub use errors::{ApplicationError, DomainError};
pub use flows::{
    AskKind, CreatorReply, ParticipantResolution, PendingAsk, Prompt, PromptTransition, QuizPhase,
};
