//! slbot - Straylight Bot
//!
//! Runs the bot core against the console adapter.

use slbot::clock::SystemClock;
use slbot::config::{self, Config};
use slbot::connection::console::{ConsoleConnection, spawn_stdin_reader};
use slbot::connection::Inbound;
use slbot::persistence::Database;
use slbot::plugin::PluginCatalog;
use slbot::{BotCore, Event, settings, telemetry};
use std::sync::Arc;
use tracing::{error, info};

/// Inbound items buffered between the console reader and the core.
const INBOUND_CHANNEL_SIZE: usize = 256;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "slbot.toml".to_string());

    let config = Config::load(&config_path)?;
    telemetry::init(config.logging.format);

    if let Err(errors) = config::validate(&config) {
        for e in &errors {
            error!(path = %config_path, error = %e, "Invalid configuration");
        }
        return Err(anyhow::anyhow!(
            "Refusing to start with {} configuration error(s)",
            errors.len()
        ));
    }

    info!(
        nick = %config.bot.nick,
        host = %config.connection.host,
        port = config.connection.port,
        "Starting slbot"
    );

    let store = settings::open(&config.settings)?;
    let database = Database::open(config.persistence.as_ref()).await;
    let mut core = BotCore::new(
        config,
        Box::new(ConsoleConnection::stdout()),
        store,
        PluginCatalog::builtin(),
        Arc::new(SystemClock),
    )
    .with_database(database);
    core.start()?;

    let (tx, rx) = tokio::sync::mpsc::channel(INBOUND_CHANNEL_SIZE);
    // The console is always "connected".
    tx.send(Inbound::Event(Event::Connected)).await?;
    let reader = spawn_stdin_reader(tx);

    core.run(rx).await?;
    reader.abort();

    info!("slbot stopped");
    Ok(())
}
