use std::future::Future;

use anyhow::Result;
use cquiz_core::config::{AppConfig, LoadOptions, LogFormat, LoggingConfig};
use tracing::{info, warn, Level};

use crate::bootstrap::{bootstrap_with_config, Application, ChatAdapters};
use crate::shutdown::StopSignal;

/// Installs the global subscriber. A second call keeps the first subscriber.
pub fn init_logging(logging: &LoggingConfig) {
    let log_level = logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt().with_target(false).with_max_level(log_level);

    let installed = match logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if installed.is_err() {
        warn!(event_name = "system.logging.already_installed", "tracing subscriber already set");
    }
}

/// Entry point for a chat platform binary: config, logging, bootstrap, then `serve`.
pub async fn run<F>(options: LoadOptions, chat: ChatAdapters, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let config = AppConfig::load(options)?;
    init_logging(&config.logging);

    let app = bootstrap_with_config(config, chat).await?;
    serve(app, shutdown).await
}

/// Runs the scheduler and the chat transport until `shutdown` resolves, then stops both and
/// closes the pool. Reveals in flight observe the same stop signal.
pub async fn serve<F>(app: Application, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let (stop_handle, stop) = StopSignal::root();

    let scheduler = app.scheduler();
    let scheduler_task = tokio::spawn({
        let stop = stop.clone();
        async move { scheduler.run(stop).await }
    });

    let runner = app.transport_runner(&stop);
    let transport_task = tokio::spawn(async move {
        if let Err(error) = runner.start().await {
            warn!(
                event_name = "ingress.chat.transport_failed",
                error = %error,
                "chat transport stopped with an error"
            );
        }
    });

    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bot_user_id = %app.config.chat.bot_user_id,
        trigger = %app.config.chat.command_trigger,
        "cquiz server started"
    );
    shutdown.await;
    info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "cquiz server stopping"
    );

    stop_handle.stop();
    scheduler_task.await?;
    transport_task.abort();
    app.db_pool.close().await;

    Ok(())
}
