use thiserror::Error;

use crate::flows::states::{QuizEvent, QuizPhase, TransitionOutcome};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: QuizPhase, event: QuizEvent },
}

pub trait FlowDefinition {
    fn initial_state(&self) -> QuizPhase;
    fn transition(
        &self,
        current: QuizPhase,
        event: QuizEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

/// Lifecycle of a single quiz from creation to fully answered.
#[derive(Clone, Debug, Default)]
pub struct QuizFlow;

impl FlowDefinition for QuizFlow {
    fn initial_state(&self) -> QuizPhase {
        QuizPhase::Draft
    }

    fn transition(
        &self,
        current: QuizPhase,
        event: QuizEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_quiz(current, event)
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_state(&self) -> QuizPhase {
        self.flow.initial_state()
    }

    pub fn apply(
        &self,
        current: QuizPhase,
        event: QuizEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(current, event)
    }
}

impl Default for FlowEngine<QuizFlow> {
    fn default() -> Self {
        Self::new(QuizFlow)
    }
}

fn transition_quiz(
    current: QuizPhase,
    event: QuizEvent,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use QuizEvent::{AnswerSubmitted, CollectionEnded, ParticipantsSet, QuestionAdded};
    use QuizPhase::{Collecting, Complete, Draft};

    let to = match (current, event) {
        (Draft, ParticipantsSet) => Collecting,
        (Collecting, QuestionAdded) => Collecting,
        (Collecting, CollectionEnded) => Complete,
        (Complete, AnswerSubmitted) => Complete,
        (Draft, QuestionAdded | CollectionEnded | AnswerSubmitted)
        | (Collecting, ParticipantsSet | AnswerSubmitted)
        | (Complete, ParticipantsSet | QuestionAdded | CollectionEnded) => {
            return Err(FlowTransitionError::InvalidTransition { state: current, event });
        }
    };

    Ok(TransitionOutcome { from: current, to, event })
}
