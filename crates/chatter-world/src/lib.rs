//! World state for the Chatter server.
//!
//! A [`World`] owns every entity in it and is the only thing that mutates
//! them. It knows nothing about sockets or tasks: inbound frames arrive as
//! [`ClientInput`](chatter_protocol::ClientInput) through
//! [`World::handle_input`], and anything a session should receive is queued
//! as an [`Envelope`] for the owner to drain.
//!
//! # Modules
//!
//! - [`entity`] -- [`Entity`] and its per-kind state
//! - [`world`] -- The entity registry, client bindings and input handling
//! - [`replication`] -- Per-tick payloads and the seen-by buffer swap
//! - [`growth`] -- Plant and word branching
//! - [`markov`] -- The [`MarkovSource`] text generator
//! - [`settings`] -- Per-world tunables
//! - [`starting_world`] -- Terrain and plants placed at creation
//! - [`spatial`] -- Optional spatial index hook
//! - [`outgoing`] -- Messages queued for sessions
//!
//! # Tick order
//!
//! The owner calls [`World::tick`] (growth) and then, regardless of its
//! result, [`World::broadcast_tick`] (replication and swap).

pub mod entity;
pub mod error;
pub mod growth;
pub mod markov;
pub mod outgoing;
pub mod replication;
pub mod settings;
pub mod spatial;
pub mod starting_world;
pub mod world;

pub use entity::{Ant, Body, Entity, Plant, TerrBlock, TextBox, Word};
pub use error::WorldError;
pub use markov::MarkovSource;
pub use outgoing::{Envelope, Outgoing};
pub use replication::{Payload, WorldUpdate};
pub use settings::{PlantSpec, TerrainSpec, WorldSettings};
pub use spatial::{NoIndex, SpatialIndex};
pub use world::World;
