pub mod engine;
pub mod machine;
pub mod states;

pub use engine::{FlowDefinition, FlowEngine, FlowTransitionError, QuizFlow};
pub use machine::{parse_participant_names, END_KEYWORD};
pub use states::{
    AskKind, CreatorReply, ParticipantResolution, PendingAsk, Prompt, PromptTransition, QuizEvent,
    QuizPhase, TransitionOutcome,
};
