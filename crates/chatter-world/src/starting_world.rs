//! Initial population of a freshly created world.

use chatter_types::{EntityId, Point};
use tracing::debug;

use crate::entity::Entity;
use crate::error::WorldError;
use crate::settings::TerrainSpec;
use crate::world::World;

/// Helper to build a [`TerrainSpec`].
const fn block(x: f32, y: f32, w: f32, h: f32) -> TerrainSpec {
    TerrainSpec {
        pos: Point::new(x, y),
        scale: Point::new(w, h),
        rot: 0.0,
    }
}

/// The built-in layout: a long ground strip with two ledges above it.
pub const DEFAULT_TERRAIN: [TerrainSpec; 3] = [
    block(0.0, 400.0, 2000.0, 40.0),
    block(-300.0, 250.0, 240.0, 20.0),
    block(350.0, 180.0, 200.0, 20.0),
];

/// Populate `world` with its configured terrain and plants.
///
/// Returns the ids of every entity created, terrain first.
pub fn populate(world: &mut World) -> Result<Vec<EntityId>, WorldError> {
    let terrain = world
        .settings()
        .terrain
        .clone()
        .unwrap_or_else(|| DEFAULT_TERRAIN.to_vec());
    let plants = world.settings().plants.clone();

    let mut ids = Vec::with_capacity(terrain.len().saturating_add(plants.len()));
    for spec in terrain {
        let entity = Entity::terr_block(spec.pos, spec.rot, spec.scale);
        ids.push(entity.id().clone());
        world.add(entity)?;
    }
    for spec in plants {
        let entity = Entity::plant(spec.pos, spec.rot, spec.text);
        ids.push(entity.id().clone());
        world.add(entity)?;
    }

    debug!(world = %world.id(), entities = ids.len(), "populated starting world");
    Ok(ids)
}
