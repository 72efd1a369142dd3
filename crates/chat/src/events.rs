use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::commands::{
    normalize_quiz_command, CommandParseError, CommandResponse, CommandRouteError, CommandRouter,
    QuizCommandService, SlashCommandPayload,
};

pub const INTERNAL_ERROR_TEXT: &str =
    "An unknown error occurred. Please talk to your system administrator for help.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatEnvelope {
    pub envelope_id: String,
    pub event: ChatEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatEvent {
    SlashCommand(SlashCommandPayload),
    MessagePosted(MessagePostedEvent),
    Unsupported { event_type: String },
}

impl ChatEvent {
    pub fn event_type(&self) -> ChatEventType {
        match self {
            Self::SlashCommand(_) => ChatEventType::SlashCommand,
            Self::MessagePosted(_) => ChatEventType::MessagePosted,
            Self::Unsupported { .. } => ChatEventType::Unsupported,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChatEventType {
    SlashCommand,
    MessagePosted,
    Unsupported,
}

/// Any post the bot can see; filtering to its own direct channel happens downstream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessagePostedEvent {
    pub channel_id: String,
    pub user_id: String,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(CommandResponse),
    Processed,
    Ignored,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageOutcome {
    Replied,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Parse(#[from] CommandParseError),
    #[error(transparent)]
    Route(#[from] CommandRouteError),
    #[error("direct message handler failure: {0}")]
    DirectMessage(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> ChatEventType;
    async fn handle(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<ChatEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

pub struct SlashCommandHandler<S> {
    trigger: String,
    router: CommandRouter<S>,
}

impl<S> SlashCommandHandler<S>
where
    S: QuizCommandService,
{
    pub fn new(trigger: impl Into<String>, service: S) -> Self {
        Self { trigger: trigger.into(), router: CommandRouter::new(service) }
    }
}

#[async_trait]
impl<S> EventHandler for SlashCommandHandler<S>
where
    S: QuizCommandService + 'static,
{
    fn event_type(&self) -> ChatEventType {
        ChatEventType::SlashCommand
    }

    async fn handle(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChatEvent::SlashCommand(payload) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let normalized = normalize_quiz_command(payload.clone(), &self.trigger)?;
        let response = match self.router.route(normalized).await {
            Ok(response) => response,
            Err(error) => {
                warn!(
                    event_name = "ingress.chat.command_failed",
                    correlation_id = %ctx.correlation_id,
                    user_id = %payload.user_id,
                    error = %error,
                    "slash command failed"
                );
                CommandResponse::ephemeral(INTERNAL_ERROR_TEXT)
            }
        };
        Ok(HandlerResult::Responded(response))
    }
}

#[async_trait]
pub trait DirectMessageService: Send + Sync {
    async fn handle_direct_message(
        &self,
        event: &MessagePostedEvent,
        ctx: &EventContext,
    ) -> Result<MessageOutcome, EventHandlerError>;
}

pub struct DirectMessageHandler<S> {
    service: S,
}

impl<S> DirectMessageHandler<S>
where
    S: DirectMessageService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for DirectMessageHandler<S>
where
    S: DirectMessageService + 'static,
{
    fn event_type(&self) -> ChatEventType {
        ChatEventType::MessagePosted
    }

    async fn handle(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChatEvent::MessagePosted(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        Ok(match self.service.handle_direct_message(event, ctx).await? {
            MessageOutcome::Replied => HandlerResult::Processed,
            MessageOutcome::Ignored => HandlerResult::Ignored,
        })
    }
}
