use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::commands::CommandResponse;
use crate::events::{ChatEnvelope, ChatEvent, EventContext, EventDispatcher, HandlerResult};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

/// Inbound event stream from the chat platform.
///
/// Slash commands are answered through `acknowledge`, so the runner dispatches before it acks.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<ChatEnvelope>, TransportError>;
    async fn acknowledge(
        &self,
        envelope_id: &str,
        response: Option<&CommandResponse>,
    ) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// Pumps one transport connection into the dispatcher until the stream closes.
pub struct ChatTransportRunner {
    transport: Arc<dyn ChatTransport>,
    dispatcher: EventDispatcher,
}

impl ChatTransportRunner {
    pub fn new(transport: Arc<dyn ChatTransport>, dispatcher: EventDispatcher) -> Self {
        Self { transport, dispatcher }
    }

    pub async fn start(&self) -> Result<(), TransportError> {
        self.transport.connect().await?;
        info!(event_name = "ingress.chat.connected", "chat transport connected");

        loop {
            let Some(envelope) = self.transport.next_envelope().await? else {
                info!(event_name = "ingress.chat.closed", "chat transport stream closed");
                return self.transport.disconnect().await;
            };
            let (user_id, channel_id) = correlation_fields(&envelope);

            info!(
                event_name = "ingress.chat.envelope_received",
                envelope_id = %envelope.envelope_id,
                event_type = ?envelope.event.event_type(),
                correlation_id = %envelope.envelope_id,
                user_id = user_id.unwrap_or("unknown"),
                channel_id = channel_id.unwrap_or("unknown"),
                "received chat envelope"
            );

            let context = EventContext { correlation_id: envelope.envelope_id.clone() };
            let response = match self.dispatcher.dispatch(&envelope, &context).await {
                Ok(HandlerResult::Responded(response)) => Some(response),
                Ok(HandlerResult::Processed | HandlerResult::Ignored) => None,
                Err(error) => {
                    warn!(
                        event_name = "ingress.chat.dispatch_failed",
                        envelope_id = %envelope.envelope_id,
                        correlation_id = %envelope.envelope_id,
                        user_id = user_id.unwrap_or("unknown"),
                        channel_id = channel_id.unwrap_or("unknown"),
                        error = %error,
                        "event dispatch failed; continuing transport loop"
                    );
                    None
                }
            };

            if let Err(error) =
                self.transport.acknowledge(&envelope.envelope_id, response.as_ref()).await
            {
                warn!(
                    event_name = "ingress.chat.ack_failed",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    error = %error,
                    "failed to acknowledge chat envelope"
                );
            } else {
                debug!(
                    event_name = "ingress.chat.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    responded = response.is_some(),
                    "acknowledged chat envelope"
                );
            }
        }
    }
}

fn correlation_fields(envelope: &ChatEnvelope) -> (Option<&str>, Option<&str>) {
    match &envelope.event {
        ChatEvent::SlashCommand(payload) => {
            (Some(payload.user_id.as_str()), Some(payload.channel_id.as_str()))
        }
        ChatEvent::MessagePosted(event) => {
            (Some(event.user_id.as_str()), Some(event.channel_id.as_str()))
        }
        ChatEvent::Unsupported { .. } => (None, None),
    }
}
