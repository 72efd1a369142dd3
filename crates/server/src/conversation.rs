use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use cquiz_chat::events::{
    DirectMessageService, EventContext, EventHandlerError, MessageOutcome, MessagePostedEvent,
};
use cquiz_chat::gateway::ChatGateway;
use cquiz_core::errors::{ApplicationError, DomainError};
use cquiz_core::flows::{parse_participant_names, END_KEYWORD};
use cquiz_core::{AskKind, CreatorReply, ParticipantResolution, PendingAsk};
use cquiz_db::QuizStore;

use crate::workflow::read_modify_write;

pub const NO_PENDING_ASK: &str = "Thank you for messaging me, but I am a bot. I will get back to you whenever I have questions for you.";
pub const ANSWER_RECORDED: &str = "Thank you for your answer!";
pub const QUESTION_ADDED: &str = "Question added!";
pub const QUIZ_COMPLETED: &str =
    "Quiz completed. Now the participants will start to receive the questions to answer.";
pub const PARTICIPANTS_ADDED: &str = "Participants added!";
pub const NO_VALID_PARTICIPANT: &str =
    "You should add at least one valid participant. Please, enter the participant list again.";

pub const ANSWER_NOT_RECORDED: &str = "There has been an internal error. Please, answer again.";
pub const END_NOT_RECORDED: &str =
    "There has been an internal error while completing the quiz. Please, type \"end\" again.";
pub const QUESTION_NOT_RECORDED: &str =
    "There has been an internal error while adding the question. Please, write the question again.";
pub const PARTICIPANTS_NOT_RECORDED: &str = "There has been an internal error while adding the participants. Please, write the participant list again.";
pub const MESSAGE_NOT_RECORDED: &str =
    "There has been an internal error and your message was not recorded. Please, send it again.";

pub fn unresolved_participant_message(name: &str) -> String {
    format!("Could not find user `{name}`. It will not be added to the quiz.")
}

/// Turns direct messages to the bot into answers for whatever it is waiting on.
pub struct ConversationRouter {
    store: QuizStore,
    gateway: Arc<dyn ChatGateway>,
    bot_user_id: String,
    max_conflict_retries: u32,
}

impl ConversationRouter {
    pub fn new(
        store: QuizStore,
        gateway: Arc<dyn ChatGateway>,
        bot_user_id: impl Into<String>,
        max_conflict_retries: u32,
    ) -> Self {
        Self { store, gateway, bot_user_id: bot_user_id.into(), max_conflict_retries }
    }

    async fn is_bot_direct_channel(&self, event: &MessagePostedEvent) -> bool {
        match self.gateway.direct_channel_with(&event.user_id).await {
            Ok(channel_id) => channel_id == event.channel_id,
            Err(error) => {
                warn!(
                    event_name = "ingress.chat.direct_channel_lookup_failed",
                    user_id = %event.user_id,
                    error = %error,
                    "could not resolve direct channel"
                );
                false
            }
        }
    }

    async fn reply(&self, user_id: &str, text: &str) {
        if let Err(error) = self.gateway.send_direct_message(user_id, text).await {
            warn!(
                event_name = "egress.chat.reply_failed",
                user_id,
                error = %error,
                "could not deliver reply"
            );
        }
    }

    async fn record_answer(&self, ask: &PendingAsk, event: &MessagePostedEvent) -> &'static str {
        let Some(question_index) = ask.question_index else {
            return ANSWER_NOT_RECORDED;
        };
        let result = read_modify_write(&self.store, self.max_conflict_retries, |quizzes| {
            quizzes.apply_answer(&ask.quiz_id, question_index, &event.user_id, &event.text)
        })
        .await;

        match result {
            Ok(()) => ANSWER_RECORDED,
            Err(error) => {
                log_not_recorded(ask, &event.user_id, &error);
                ANSWER_NOT_RECORDED
            }
        }
    }

    async fn record_creator_reply(
        &self,
        ask: &PendingAsk,
        event: &MessagePostedEvent,
    ) -> &'static str {
        let result = read_modify_write(&self.store, self.max_conflict_retries, |quizzes| {
            quizzes.apply_new_question_or_end(&ask.quiz_id, &event.text)
        })
        .await;

        match result {
            Ok(CreatorReply::QuestionAdded { .. }) => QUESTION_ADDED,
            Ok(CreatorReply::QuizCompleted) => {
                info!(
                    event_name = "quiz.collection_ended",
                    quiz_id = %ask.quiz_id,
                    "quiz completed by its creator"
                );
                QUIZ_COMPLETED
            }
            Err(error) => {
                log_not_recorded(ask, &event.user_id, &error);
                if event.text == END_KEYWORD {
                    END_NOT_RECORDED
                } else {
                    QUESTION_NOT_RECORDED
                }
            }
        }
    }

    async fn record_participants(
        &self,
        ask: &PendingAsk,
        event: &MessagePostedEvent,
    ) -> &'static str {
        let mut resolution = ParticipantResolution::default();
        for name in parse_participant_names(&event.text) {
            match self.gateway.resolve_user_by_name(&name).await {
                Ok(user_id) => resolution.resolved.push(user_id),
                Err(error) => {
                    debug!(
                        event_name = "quiz.participant_unresolved",
                        quiz_id = %ask.quiz_id,
                        name = %name,
                        error = %error,
                        "participant name not found"
                    );
                    self.reply(&event.user_id, &unresolved_participant_message(&name)).await;
                    resolution.unresolved.push(name);
                }
            }
        }

        let result = read_modify_write(&self.store, self.max_conflict_retries, |quizzes| {
            quizzes.apply_participants(&ask.quiz_id, &event.user_id, resolution.clone())
        })
        .await;

        match result {
            Ok(participants) => {
                info!(
                    event_name = "quiz.participants_set",
                    quiz_id = %ask.quiz_id,
                    participants = participants.len(),
                    "participants recorded"
                );
                PARTICIPANTS_ADDED
            }
            Err(ApplicationError::Domain(DomainError::PartialFailure { .. })) => {
                NO_VALID_PARTICIPANT
            }
            Err(error) => {
                log_not_recorded(ask, &event.user_id, &error);
                PARTICIPANTS_NOT_RECORDED
            }
        }
    }
}

fn log_not_recorded(ask: &PendingAsk, user_id: &str, error: &ApplicationError) {
    warn!(
        event_name = "quiz.reply_not_recorded",
        quiz_id = %ask.quiz_id,
        user_id,
        kind = ?ask.kind,
        conflict = error.is_conflict(),
        error = %error,
        "direct message could not be applied"
    );
}

#[async_trait]
impl DirectMessageService for ConversationRouter {
    async fn handle_direct_message(
        &self,
        event: &MessagePostedEvent,
        ctx: &EventContext,
    ) -> Result<MessageOutcome, EventHandlerError> {
        if event.user_id == self.bot_user_id || !self.is_bot_direct_channel(event).await {
            return Ok(MessageOutcome::Ignored);
        }

        let snapshot = match self.store.load_all().await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(
                    event_name = "quiz.reply_not_recorded",
                    correlation_id = %ctx.correlation_id,
                    user_id = %event.user_id,
                    error = %error,
                    "quiz document could not be loaded for a direct message"
                );
                self.reply(&event.user_id, MESSAGE_NOT_RECORDED).await;
                return Ok(MessageOutcome::Replied);
            }
        };

        let Some(ask) = snapshot.quizzes.pending_ask(&event.user_id) else {
            self.reply(&event.user_id, NO_PENDING_ASK).await;
            return Ok(MessageOutcome::Replied);
        };

        debug!(
            event_name = "ingress.chat.reply_received",
            correlation_id = %ctx.correlation_id,
            quiz_id = %ask.quiz_id,
            user_id = %event.user_id,
            kind = ?ask.kind,
            "direct message matched a pending ask"
        );

        let confirmation = match ask.kind {
            AskKind::ForAnswer => self.record_answer(&ask, event).await,
            AskKind::ForNewQuestion => self.record_creator_reply(&ask, event).await,
            AskKind::ForParticipants => self.record_participants(&ask, event).await,
        };
        self.reply(&event.user_id, confirmation).await;
        Ok(MessageOutcome::Replied)
    }
}
