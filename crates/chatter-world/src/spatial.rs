//! Optional spatial index hook.
//!
//! A world notifies its index whenever an entity is added, moved through
//! [`World::move_entity`](crate::World::move_entity) or removed. Nothing in
//! the world reads the index back; queries such as
//! [`World::entities_within`](crate::World::entities_within) scan the
//! registry, so an index that lags behind can only cost performance.

use chatter_types::{EntityId, Point};

/// Receives entity placement updates.
pub trait SpatialIndex: Send + core::fmt::Debug {
    /// An entity appeared at `pos`.
    fn insert(&mut self, id: &EntityId, pos: Point);
    /// An entity moved to `pos`.
    fn update(&mut self, id: &EntityId, pos: Point);
    /// An entity left the world.
    fn remove(&mut self, id: &EntityId);
}

/// An index that ignores every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIndex;

impl SpatialIndex for NoIndex {
    fn insert(&mut self, _id: &EntityId, _pos: Point) {}
    fn update(&mut self, _id: &EntityId, _pos: Point) {}
    fn remove(&mut self, _id: &EntityId) {}
}
