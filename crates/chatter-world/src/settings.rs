//! Per-world tunables.

use chatter_types::Point;
use serde::Deserialize;

/// Where a terrain block goes and how big it is.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TerrainSpec {
    /// Centre of the block.
    pub pos: Point,
    /// Width and height.
    pub scale: Point,
    /// Rotation in radians.
    #[serde(default)]
    pub rot: f32,
}

/// A plant placed when the world is created.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlantSpec {
    /// Where it is planted.
    pub pos: Point,
    /// Rotation in radians (0 grows straight up).
    #[serde(default)]
    pub rot: f32,
    /// Seed word; empty draws one from the corpus.
    #[serde(default)]
    pub text: String,
}

/// Settings that shape a single world.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorldSettings {
    /// Where new ants appear.
    #[serde(default = "default_spawn_point")]
    pub spawn_point: Point,
    /// Plants branch once every this many ticks.
    #[serde(default = "default_growth_interval")]
    pub growth_interval_ticks: u64,
    /// Skew of the word picked for branching; above 0 and below 1 favours
    /// older words.
    #[serde(default = "default_growth_exponent")]
    pub growth_exponent: f64,
    /// A plant stops growing at this many words.
    #[serde(default = "default_max_plant_words")]
    pub max_plant_words: usize,
    /// RNG seed; `None` seeds from the OS.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Terrain blocks. `None` uses the built-in layout.
    #[serde(default)]
    pub terrain: Option<Vec<TerrainSpec>>,
    /// Plants placed at startup.
    #[serde(default)]
    pub plants: Vec<PlantSpec>,
}

const fn default_spawn_point() -> Point {
    Point::new(10.0, 10.0)
}

const fn default_growth_interval() -> u64 {
    30
}

const fn default_growth_exponent() -> f64 {
    0.7
}

const fn default_max_plant_words() -> usize {
    25
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            spawn_point: default_spawn_point(),
            growth_interval_ticks: default_growth_interval(),
            growth_exponent: default_growth_exponent(),
            max_plant_words: default_max_plant_words(),
            seed: None,
            terrain: None,
            plants: Vec::new(),
        }
    }
}
