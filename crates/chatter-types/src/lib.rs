//! Shared type definitions for the Chatter shared-world server.
//!
//! Every crate in the workspace speaks in terms of the identifiers and
//! small value types defined here, so that the replication engine, the
//! wire protocol and the connection layer agree on what an entity id or
//! a position looks like.
//!
//! # Modules
//!
//! - [`ids`] -- Strongly-typed identifiers for entities, sessions, worlds
//!   and connections
//! - [`enums`] -- Entity kind tags and the ant bell type
//! - [`geometry`] -- The 2D [`Point`] used for entity positions

pub mod enums;
pub mod geometry;
pub mod ids;

use std::collections::BTreeMap;

pub use enums::{BellType, EntityKind};
pub use geometry::Point;
pub use ids::{ConnectionId, EntityId, SessionId, WorldId};

/// Named-field record used for entity snapshots and diffs.
///
/// Keys are wire field names (`pos`, `rot`, `text`, ...). A `BTreeMap`
/// keeps the serialized order stable, which makes payloads diffable in
/// logs and tests.
pub type FieldMap = BTreeMap<String, serde_json::Value>;
