use serde::{Deserialize, Serialize};

use crate::domain::quiz::{QuizId, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuizPhase {
    /// Created, participants not yet supplied.
    Draft,
    /// Participants known, creator still adding questions.
    Collecting,
    /// Creator typed `end`; only answer cells change from here on.
    Complete,
}

impl QuizPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Collecting => "collecting",
            Self::Complete => "complete",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuizEvent {
    ParticipantsSet,
    QuestionAdded,
    CollectionEnded,
    AnswerSubmitted,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: QuizPhase,
    pub to: QuizPhase,
    pub event: QuizEvent,
}

/// What the system is currently waiting for from a given user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AskKind {
    ForParticipants,
    ForNewQuestion,
    ForAnswer,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAsk {
    pub kind: AskKind,
    pub quiz_id: QuizId,
    /// Set only for `AskKind::ForAnswer`.
    pub question_index: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromptTransition {
    AskParticipants { quiz_id: QuizId },
    AskNewQuestion { quiz_id: QuizId },
    AskAnswer { quiz_id: QuizId, question_index: usize, user_id: UserId },
}

impl PromptTransition {
    pub fn quiz_id(&self) -> &str {
        match self {
            Self::AskParticipants { quiz_id }
            | Self::AskNewQuestion { quiz_id }
            | Self::AskAnswer { quiz_id, .. } => quiz_id,
        }
    }
}

/// The next message to send, and the ask it raises once persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub user_id: UserId,
    pub message: String,
    pub transition: PromptTransition,
}

/// Participant names split into resolved ids and names the directory did not know.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantResolution {
    pub resolved: Vec<UserId>,
    pub unresolved: Vec<String>,
}

/// Result of the creator's reply while a new question is being asked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreatorReply {
    QuestionAdded { question_index: usize },
    QuizCompleted,
}
