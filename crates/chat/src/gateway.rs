use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("{kind} `{name}` not found")]
    NotFound { kind: &'static str, name: String },
    #[error("message delivery failed: {0}")]
    Delivery(String),
}

/// Outbound messaging and directory lookups against the chat platform.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn send_direct_message(&self, user_id: &str, text: &str) -> Result<(), GatewayError>;
    async fn send_channel_message(&self, channel_id: &str, text: &str)
        -> Result<(), GatewayError>;
    async fn resolve_user_by_name(&self, name: &str) -> Result<String, GatewayError>;
    async fn resolve_channel_by_name(
        &self,
        team_id: &str,
        name: &str,
    ) -> Result<String, GatewayError>;
    async fn user_name(&self, user_id: &str) -> Option<String>;
    /// Id of the direct channel between the bot and `user_id`.
    async fn direct_channel_with(&self, user_id: &str) -> Result<String, GatewayError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageTarget {
    Direct(String),
    Channel(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    pub target: MessageTarget,
    pub text: String,
}

#[derive(Default)]
struct Directory {
    users_by_name: HashMap<String, String>,
    names_by_user: HashMap<String, String>,
    channels: HashMap<(String, String), String>,
    undeliverable_users: HashSet<String>,
}

/// Gateway backed by a fixed directory that records every message it is asked to send.
#[derive(Default)]
pub struct InMemoryChatGateway {
    directory: Mutex<Directory>,
    outbox: Mutex<Vec<OutboundMessage>>,
}

impl InMemoryChatGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user_id: &str, name: &str) -> Self {
        let directory = self.directory.get_mut();
        directory.users_by_name.insert(name.to_owned(), user_id.to_owned());
        directory.names_by_user.insert(user_id.to_owned(), name.to_owned());
        self
    }

    pub fn with_channel(mut self, team_id: &str, channel_id: &str, name: &str) -> Self {
        self.directory
            .get_mut()
            .channels
            .insert((team_id.to_owned(), name.to_owned()), channel_id.to_owned());
        self
    }

    /// Direct messages to `user_id` fail with [`GatewayError::Delivery`].
    pub fn with_undeliverable_user(mut self, user_id: &str) -> Self {
        self.directory.get_mut().undeliverable_users.insert(user_id.to_owned());
        self
    }

    pub fn direct_channel_id(user_id: &str) -> String {
        format!("dm-{user_id}")
    }

    pub async fn sent(&self) -> Vec<OutboundMessage> {
        self.outbox.lock().await.clone()
    }

    pub async fn direct_messages_to(&self, user_id: &str) -> Vec<String> {
        self.outbox
            .lock()
            .await
            .iter()
            .filter(|message| matches!(&message.target, MessageTarget::Direct(id) if id == user_id))
            .map(|message| message.text.clone())
            .collect()
    }

    pub async fn channel_messages(&self, channel_id: &str) -> Vec<String> {
        self.outbox
            .lock()
            .await
            .iter()
            .filter(|message| {
                matches!(&message.target, MessageTarget::Channel(id) if id == channel_id)
            })
            .map(|message| message.text.clone())
            .collect()
    }
}

#[async_trait]
impl ChatGateway for InMemoryChatGateway {
    async fn send_direct_message(&self, user_id: &str, text: &str) -> Result<(), GatewayError> {
        if self.directory.lock().await.undeliverable_users.contains(user_id) {
            return Err(GatewayError::Delivery(format!("direct channel to `{user_id}` refused")));
        }
        debug!(event_name = "egress.chat.direct_message", user_id, "sending direct message");
        self.outbox.lock().await.push(OutboundMessage {
            target: MessageTarget::Direct(user_id.to_owned()),
            text: text.to_owned(),
        });
        Ok(())
    }

    async fn send_channel_message(
        &self,
        channel_id: &str,
        text: &str,
    ) -> Result<(), GatewayError> {
        debug!(event_name = "egress.chat.channel_message", channel_id, "posting channel message");
        self.outbox.lock().await.push(OutboundMessage {
            target: MessageTarget::Channel(channel_id.to_owned()),
            text: text.to_owned(),
        });
        Ok(())
    }

    async fn resolve_user_by_name(&self, name: &str) -> Result<String, GatewayError> {
        self.directory
            .lock()
            .await
            .users_by_name
            .get(name)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound { kind: "user", name: name.to_owned() })
    }

    async fn resolve_channel_by_name(
        &self,
        team_id: &str,
        name: &str,
    ) -> Result<String, GatewayError> {
        self.directory
            .lock()
            .await
            .channels
            .get(&(team_id.to_owned(), name.to_owned()))
            .cloned()
            .ok_or_else(|| GatewayError::NotFound { kind: "channel", name: name.to_owned() })
    }

    async fn user_name(&self, user_id: &str) -> Option<String> {
        self.directory.lock().await.names_by_user.get(user_id).cloned()
    }

    async fn direct_channel_with(&self, user_id: &str) -> Result<String, GatewayError> {
        Ok(Self::direct_channel_id(user_id))
    }
}
