use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use cquiz_chat::commands::{
    CommandEnvelope, CommandResponse, CommandRouteError, QuizCommandService,
};
use cquiz_chat::gateway::ChatGateway;
use cquiz_core::errors::{ApplicationError, DomainError};
use cquiz_db::QuizStore;

use crate::reveal::RevealRoutine;
use crate::shutdown::StopSignal;
use crate::workflow::read_modify_write;

pub const CREATION_STARTED: &str =
    "Quiz creation started. The bot will contact you to fill up the quiz.";
pub const CREATION_STARTED_BUSY: &str = "Quiz creation started. You seem to be in the middle of a conversation with the bot, so it will contact you when you finish answering his questions.";
pub const NO_QUIZZES: &str = "No quizzes created.";
pub const QUIZ_DOES_NOT_EXIST: &str = "Quiz does not exist.";
pub const CHANNEL_DOES_NOT_EXIST: &str = "Channel does not exist.";
pub const QUIZ_STARTED: &str = "Quiz started on channel.";

/// Backs `/cquiz create|list|start` with the quiz store.
pub struct QuizCommands {
    store: QuizStore,
    gateway: Arc<dyn ChatGateway>,
    reveal: RevealRoutine,
    stop: StopSignal,
    max_conflict_retries: u32,
}

impl QuizCommands {
    pub fn new(
        store: QuizStore,
        gateway: Arc<dyn ChatGateway>,
        reveal: RevealRoutine,
        stop: StopSignal,
        max_conflict_retries: u32,
    ) -> Self {
        Self { store, gateway, reveal, stop, max_conflict_retries }
    }
}

fn service_error(error: impl std::fmt::Display) -> CommandRouteError {
    CommandRouteError::Service(error.to_string())
}

#[async_trait]
impl QuizCommandService for QuizCommands {
    async fn create_quiz(
        &self,
        name: &str,
        envelope: &CommandEnvelope,
    ) -> Result<CommandResponse, CommandRouteError> {
        let creator = envelope.user_id.as_str();
        let result = read_modify_write(&self.store, self.max_conflict_retries, |quizzes| {
            quizzes.create_quiz(name, creator)?;
            Ok(quizzes.is_user_available(creator))
        })
        .await;

        match result {
            Ok(available) => {
                info!(
                    event_name = "quiz.created",
                    correlation_id = %envelope.request_id,
                    quiz_id = name,
                    user_id = creator,
                    creator_available = available,
                    "quiz created"
                );
                Ok(CommandResponse::ephemeral(if available {
                    CREATION_STARTED
                } else {
                    CREATION_STARTED_BUSY
                }))
            }
            Err(error @ ApplicationError::Domain(DomainError::AlreadyExists { .. })) => {
                Ok(CommandResponse::ephemeral(error.user_message()))
            }
            Err(error) => Err(service_error(error)),
        }
    }

    async fn list_quizzes(
        &self,
        _envelope: &CommandEnvelope,
    ) -> Result<CommandResponse, CommandRouteError> {
        let snapshot = self.store.load_all().await.map_err(service_error)?;
        if snapshot.quizzes.is_empty() {
            return Ok(CommandResponse::ephemeral(NO_QUIZZES));
        }

        let mut text = String::from("Quizzes list:\n");
        for name in snapshot.quizzes.names() {
            let _ = write!(text, "\n* {name}");
        }
        Ok(CommandResponse::ephemeral(text))
    }

    async fn start_quiz(
        &self,
        quiz_name: &str,
        channel_name: &str,
        envelope: &CommandEnvelope,
    ) -> Result<CommandResponse, CommandRouteError> {
        let snapshot = self.store.load_all().await.map_err(service_error)?;
        let Some(quiz) = snapshot.quizzes.get(quiz_name).cloned() else {
            return Ok(CommandResponse::ephemeral(QUIZ_DOES_NOT_EXIST));
        };

        let channel_id =
            match self.gateway.resolve_channel_by_name(&envelope.team_id, channel_name).await {
                Ok(channel_id) => channel_id,
                Err(error) => {
                    warn!(
                        event_name = "quiz.start.channel_unresolved",
                        correlation_id = %envelope.request_id,
                        quiz_id = quiz_name,
                        channel_name,
                        error = %error,
                        "start target channel not found"
                    );
                    return Ok(CommandResponse::ephemeral(CHANNEL_DOES_NOT_EXIST));
                }
            };

        let (_handle, stop) = self.stop.child();
        let reveal = self.reveal.clone();
        tokio::spawn(async move {
            reveal.run(&quiz, &channel_id, &stop).await;
        });

        info!(
            event_name = "quiz.start.accepted",
            correlation_id = %envelope.request_id,
            quiz_id = quiz_name,
            channel_name,
            "quiz reveal scheduled"
        );
        Ok(CommandResponse::ephemeral(QUIZ_STARTED))
    }
}
