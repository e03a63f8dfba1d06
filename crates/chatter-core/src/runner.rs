//! The universe task.
//!
//! [`run_universe`] owns the [`Universe`] for its whole life. It waits on
//! two things at once: the next command from a connection task, and the
//! next tick deadline. After every tick the deadline is re-armed to one
//! interval from *now*, so a slow tick delays the next one instead of
//! causing a burst of catch-up ticks.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::command::Command;
use crate::universe::Universe;

/// What the universe task did before it stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Ticks run.
    pub ticks: u64,
    /// Commands applied.
    pub commands: u64,
}

/// Drive `universe` until every command sender is dropped.
pub async fn run_universe(
    mut universe: Universe,
    mut commands: mpsc::UnboundedReceiver<Command>,
    interval: Duration,
) -> RunSummary {
    info!(
        interval_ms = interval.as_millis(),
        worlds = universe.world_count(),
        "universe running"
    );

    let mut summary = RunSummary::default();
    let sleep = tokio::time::sleep(interval);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    info!("command queue closed, universe stopping");
                    break;
                };
                universe.apply(command);
                summary.commands = summary.commands.saturating_add(1);
            }
            () = &mut sleep => {
                let report = universe.tick();
                summary.ticks = summary.ticks.saturating_add(1);
                if report.failed_worlds > 0 {
                    warn!(
                        tick = summary.ticks,
                        failed_worlds = report.failed_worlds,
                        "tick completed with world failures"
                    );
                }
                let now = Instant::now();
                sleep.as_mut().reset(now.checked_add(interval).unwrap_or(now));
            }
        }
    }

    info!(
        ticks = summary.ticks,
        commands = summary.commands,
        "universe stopped"
    );
    summary
}
