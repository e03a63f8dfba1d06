//! Orchestration for the Chatter server.
//!
//! The [`Universe`](universe::Universe) owns every world and the directory
//! of connected sessions. It is driven by exactly one task,
//! [`run_universe`](runner::run_universe), which interleaves commands from
//! connection tasks with fixed-rate ticks. Nothing else ever touches world
//! state, so no locks are needed.
//!
//! # Modules
//!
//! - [`config`] -- YAML configuration with environment overrides
//! - [`session`] -- Per-session outbound channel and join outcomes
//! - [`command`] -- The command queue and the handle connection tasks use
//! - [`universe`] -- World registry, session directory and dispatch
//! - [`runner`] -- The tick scheduler loop

pub mod command;
pub mod config;
pub mod runner;
pub mod session;
pub mod universe;

pub use command::{Command, UniverseClosed, UniverseHandle};
pub use config::{ChatterConfig, ConfigError};
pub use runner::{RunSummary, run_universe};
pub use session::{JoinOutcome, Outbound, Outbox};
pub use universe::{TickReport, Universe, UniverseError};
