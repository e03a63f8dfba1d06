//! Chatter server binary.
//!
//! Wires configuration, the universe task and the `WebSocket` server
//! together, then runs until `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `chatter-config.yaml` (defaults if absent)
//! 2. Initialize structured logging (tracing)
//! 3. Build the universe: one world per configured entry
//! 4. Build the binary packet registry
//! 5. Spawn the universe task
//! 6. Serve `WebSocket` sessions until shutdown

mod error;

use std::path::Path;
use std::sync::Arc;

use chatter_core::{ChatterConfig, Universe, UniverseHandle, run_universe};
use chatter_core::config::LoggingConfig;
use chatter_protocol::PacketRegistry;
use chatter_server::AppState;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Path of the configuration file, relative to the working directory.
const CONFIG_PATH: &str = "chatter-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, world construction or the server
/// fails.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // 1. Load configuration. Logging depends on it, so errors here are
    //    reported through the returned error only.
    let config = ChatterConfig::load_or_default(Path::new(CONFIG_PATH))?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!(
        host = %config.server.host,
        port = config.server.port,
        tick_interval_ms = config.tick.interval_ms,
        worlds = config.worlds.len(),
        default_world = %config.default_world,
        "chatter-engine starting"
    );

    // 3. Build the universe.
    let universe = Universe::from_config(&config)?;
    info!(world_count = universe.world_count(), "Universe built");

    // 4. Packet registry for legacy binary frames.
    let registry = PacketRegistry::standard()?;
    info!(packet_types = registry.len(), "Packet registry ready");

    // 5. Spawn the universe task.
    let (handle, commands) = UniverseHandle::channel();
    let universe_task = tokio::spawn(run_universe(universe, commands, config.tick.interval()));

    // 6. Serve until Ctrl-C.
    let state = Arc::new(AppState::new(handle, registry));
    chatter_server::start_server(&config.server, state, shutdown_signal()).await?;

    universe_task.abort();
    info!("chatter-engine shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins; otherwise the configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Ctrl-C received, shutting down"),
        Err(e) => warn!(error = %e, "failed to listen for Ctrl-C, shutting down"),
    }
}
