//! WebSocket front end for the Chatter server.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`WebSocket` endpoint** (`/connect`) where each client holds one
//!   session for the life of its socket
//! - **Health check** (`/health`) for load balancers and tests
//!
//! # Architecture
//!
//! Each accepted socket runs its own task (see [`session`]). The task
//! reads the handshake identifier, asks the universe task to join it to a
//! world through a [`UniverseHandle`](chatter_core::UniverseHandle), then
//! pumps frames both ways until either side closes. World state is never
//! touched here; every decoded frame becomes a command on the universe
//! queue.

pub mod error;
pub mod router;
pub mod server;
pub mod session;
pub mod startup;
pub mod state;

pub use error::ServerError;
pub use router::build_router;
pub use server::{bind, serve, start_server};
pub use startup::spawn_server;
pub use state::AppState;
