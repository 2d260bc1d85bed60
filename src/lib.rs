mod utils;

pub mod client;
pub mod connection;
pub mod console;
pub mod error;
pub mod models;
pub mod protocol;
pub mod session;
pub mod settings;

use std::sync::Arc;

use anyhow::Context;
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

pub use client::MonitorClient;
pub use connection::{ConnectionState, ReconnectPolicy};
pub use error::{DecodeError, TransportError};
pub use models::{AlertRecord, SessionSnapshot, SessionStatus};
pub use session::{AlertPolicy, Notification};
pub use settings::MonitorSettings;

use console::ConsoleCommand;

pub fn run() -> anyhow::Result<()> {
    let level = if settings::debug_enabled() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    // RUST_LOG still wins when set
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    info!("Gazewatch starting up...");

    let settings = settings::load_from_env()?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(monitor(settings))
}

async fn monitor(settings: MonitorSettings) -> anyhow::Result<()> {
    let client = Arc::new(MonitorClient::new(settings));
    client.start().await?;

    let cancel = CancellationToken::new();
    let renderer = tokio::spawn(console::render_loop(client.clone(), cancel.clone()));

    info!("Commands: reset, dismiss, status, quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match ConsoleCommand::parse(&line) {
                    Some(ConsoleCommand::Quit) => break,
                    Some(command) => console::execute(&client, command).await,
                    None => warn!("Unknown command {:?}", line.trim()),
                },
                Ok(None) => stdin_open = false,
                Err(err) => {
                    warn!("Failed to read stdin: {err}");
                    stdin_open = false;
                }
            },
        }
    }

    cancel.cancel();
    if let Err(err) = renderer.await {
        warn!("Render loop ended abnormally: {err}");
    }
    client.shutdown().await?;
    info!("Gazewatch stopped");
    Ok(())
}
