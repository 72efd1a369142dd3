use std::sync::Arc;

use cquiz_chat::events::{DirectMessageHandler, EventDispatcher, SlashCommandHandler};
use cquiz_chat::gateway::ChatGateway;
use cquiz_chat::socket::{ChatTransport, ChatTransportRunner};
use cquiz_core::config::{AppConfig, ConfigError, LoadOptions};
use cquiz_db::{connect_with_config, migrations, DbPool, QuizStore, SqlKeyValueStore};
use thiserror::Error;
use tracing::info;

use crate::conversation::ConversationRouter;
use crate::quiz_commands::QuizCommands;
use crate::reveal::{seeded_rng, RevealRoutine, RevealTiming, SharedRng};
use crate::scheduler::Scheduler;
use crate::shutdown::StopSignal;

/// Chat platform client: outbound gateway plus inbound event transport.
#[derive(Clone)]
pub struct ChatAdapters {
    pub gateway: Arc<dyn ChatGateway>,
    pub transport: Arc<dyn ChatTransport>,
}

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub store: QuizStore,
    pub gateway: Arc<dyn ChatGateway>,
    pub transport: Arc<dyn ChatTransport>,
    pub rng: SharedRng,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(
    options: LoadOptions,
    chat: ChatAdapters,
) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config, chat).await
}

pub async fn bootstrap_with_config(
    config: AppConfig,
    chat: ChatAdapters,
) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let store = QuizStore::new(
        Arc::new(SqlKeyValueStore::new(db_pool.clone())),
        config.store.document_key.clone(),
    );

    Ok(Application {
        config,
        db_pool,
        store,
        gateway: chat.gateway,
        transport: chat.transport,
        rng: seeded_rng(),
    })
}

impl Application {
    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(self.store.clone(), self.gateway.clone(), self.config.scheduler.interval())
    }

    pub fn reveal_routine(&self) -> RevealRoutine {
        RevealRoutine::new(
            self.gateway.clone(),
            self.rng.clone(),
            RevealTiming::from(&self.config.reveal),
        )
    }

    pub fn dispatcher(&self, stop: &StopSignal) -> EventDispatcher {
        let retries = self.config.store.max_conflict_retries;
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(SlashCommandHandler::new(
            self.config.chat.command_trigger.clone(),
            QuizCommands::new(
                self.store.clone(),
                self.gateway.clone(),
                self.reveal_routine(),
                stop.clone(),
                retries,
            ),
        ));
        dispatcher.register(DirectMessageHandler::new(ConversationRouter::new(
            self.store.clone(),
            self.gateway.clone(),
            self.config.chat.bot_user_id.clone(),
            retries,
        )));
        dispatcher
    }

    pub fn transport_runner(&self, stop: &StopSignal) -> ChatTransportRunner {
        ChatTransportRunner::new(self.transport.clone(), self.dispatcher(stop))
    }
}
