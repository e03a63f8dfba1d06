//! Plant growth.
//!
//! A plant grows a tree of [`Word`](crate::entity::Word) entities, one word
//! per growth step. The first step places a root word perpendicular to the
//! plant; every later step picks an existing word with a power-law bias and
//! tries to branch a new word off it, using the world's Markov source for
//! the text.

use core::f32::consts::{FRAC_PI_2, FRAC_PI_3};

use chatter_types::{EntityId, Point};
use rand::Rng;
use tracing::trace;

use crate::entity::Entity;
use crate::error::WorldError;
use crate::world::World;

/// Distance per character slot between a word and the next.
pub const WORD_SPACING: f32 = 5.0;
/// Extra distance between a plant and its root word.
pub const ROOT_OFFSET: f32 = 15.0;
/// Children per word.
pub const MAX_BRANCHES: usize = 2;
/// Closest two sibling branches may point, in radians.
pub const SIBLING_SEPARATION: f32 = 0.3;
/// How far a branch may drift from the plant's growth direction before it
/// is pulled back.
pub const DRIFT_LIMIT: f32 = FRAC_PI_3;
/// Full width of the random angle perturbation for a first branch.
pub const PERTURBATION: f32 = 0.8;
/// How hard a second branch is pushed away from the first.
pub const EXTRAPOLATION: f32 = 7.0;

/// Length of the slot a word of `text` occupies.
#[allow(clippy::cast_precision_loss)]
fn slot(text: &str) -> f32 {
    (text.chars().count().saturating_add(1)) as f32 * WORD_SPACING
}

/// Map a uniform sample to an index in `0..count`, skewed by `exponent`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn power_law_index(sample: f64, exponent: f64, count: usize) -> usize {
    let scaled = sample.clamp(0.0, 1.0).powf(exponent) * (count as f64 - 0.001);
    (scaled.max(0.0).floor() as usize).min(count.saturating_sub(1))
}

impl World {
    /// Grow `plant` by one word.
    ///
    /// Returns the new word's id, or `None` if nothing grew: the plant is
    /// full, the chosen word refused to branch, or `plant` is not a plant
    /// in this world.
    ///
    /// A word's bigram context is its parent's text as it was when the word
    /// grew. It is stored on the word and never follows later edits to the
    /// parent; the root's context is empty.
    pub fn branch_plant(&mut self, plant: &EntityId) -> Result<Option<EntityId>, WorldError> {
        let Some((pos, rot, text, words)) = self.entities.get(plant).and_then(|e| {
            e.as_plant()
                .map(|p| (e.pos(), e.rot(), p.text().to_owned(), p.words().to_vec()))
        }) else {
            trace!(plant = %plant, "branch on unregistered plant ignored");
            return Ok(None);
        };

        if words.is_empty() {
            return self.grow_root(plant, pos, rot, text).map(Some);
        }
        if words.len() >= self.settings().max_plant_words {
            return Ok(None);
        }

        let sample: f64 = self.rng.random();
        let index = power_law_index(sample, self.settings().growth_exponent, words.len());
        match words.get(index) {
            Some(word) => self.branch_word(word),
            None => Ok(None),
        }
    }

    fn grow_root(
        &mut self,
        plant: &EntityId,
        pos: Point,
        rot: f32,
        text: String,
    ) -> Result<EntityId, WorldError> {
        let seed = if text.is_empty() {
            self.markov.chain("", "", &mut self.rng)
        } else {
            text
        };
        let angle = rot - FRAC_PI_2;
        let root_pos = pos + Point::from_angle(angle, slot(&seed) + ROOT_OFFSET);
        let root = Entity::word(root_pos, angle, seed, plant.clone(), None, String::new());
        let root_id = root.id().clone();
        self.add(root)?;

        let owner = self
            .entities
            .get_mut(plant)
            .ok_or_else(|| WorldError::EntityNotFound(plant.clone()))?;
        owner.set_text("");
        if let Some(p) = owner.plant_mut() {
            p.words.push(root_id.clone());
        }
        trace!(plant = %plant, word = %root_id, "root word grown");
        Ok(root_id)
    }

    /// Try to grow a child off `word`.
    ///
    /// Returns `None` if the word already has two children, the source had
    /// nothing to say, or the candidate was too close to a sibling.
    pub fn branch_word(&mut self, word: &EntityId) -> Result<Option<EntityId>, WorldError> {
        let entity = self
            .entities
            .get(word)
            .ok_or_else(|| WorldError::EntityNotFound(word.clone()))?;
        let state = entity.as_word().ok_or_else(|| WorldError::WrongKind {
            id: word.clone(),
            expected: "word",
        })?;
        if state.branches().len() >= MAX_BRANCHES {
            return Ok(None);
        }

        let (pos, rot) = (entity.pos(), entity.rot());
        let text = state.text().to_owned();
        let plant = state.plant().clone();
        let siblings: Vec<(f32, String)> = state
            .branches()
            .iter()
            .filter_map(|b| self.entities.get(b))
            .filter_map(|b| b.as_word().map(|w| (b.rot(), w.text().to_owned())))
            .collect();
        let context = state.context().to_owned();

        let plant_rot = self
            .entities
            .get(&plant)
            .map(Entity::rot)
            .ok_or_else(|| WorldError::EntityNotFound(plant.clone()))?;

        let next = self.markov.chain(&text, &context, &mut self.rng);
        if next.is_empty() {
            return Ok(None);
        }

        let spread: f32 = self.rng.random();
        let mut angle = match siblings.as_slice() {
            [(sibling, _)] => rot + (rot - sibling) * EXTRAPOLATION * spread,
            _ => rot + (spread - 0.5) * PERTURBATION,
        };
        let target = plant_rot - FRAC_PI_2;
        if (angle - target).abs() > DRIFT_LIMIT {
            angle = (angle * 2.0 + target) / 3.0;
        }
        if siblings
            .iter()
            .any(|(r, t)| (r - angle).abs() < SIBLING_SEPARATION || *t == next)
        {
            return Ok(None);
        }

        let origin = pos + Point::from_angle(rot, slot(&text));
        let child_pos = origin + Point::from_angle(angle, slot(&next));
        let child = Entity::word(child_pos, angle, next, plant.clone(), Some(word.clone()), text);
        let child_id = child.id().clone();
        self.add(child)?;

        if let Some(parent) = self.entities.get_mut(word).and_then(Entity::word_mut) {
            parent.branches.push(child_id.clone());
        }
        if let Some(owner) = self.entities.get_mut(&plant).and_then(Entity::plant_mut) {
            owner.words.push(child_id.clone());
        }
        trace!(plant = %plant, parent = %word, word = %child_id, "word grown");
        Ok(Some(child_id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chatter_types::WorldId;

    use super::*;
    use crate::markov::MarkovSource;
    use crate::settings::WorldSettings;

    fn world_with(corpus: &str) -> World {
        tuned(corpus, |_| {})
    }

    fn tuned(corpus: &str, adjust: impl FnOnce(&mut WorldSettings)) -> World {
        let mut settings = WorldSettings {
            seed: Some(42),
            ..WorldSettings::default()
        };
        adjust(&mut settings);
        World::empty(WorldId::new("g"), settings, MarkovSource::from_text(corpus).unwrap())
    }

    fn planted(world: &mut World, text: &str) -> EntityId {
        let plant = Entity::plant(Point::new(0.0, 100.0), 0.0, text);
        let id = plant.id().clone();
        world.add(plant).unwrap();
        id
    }

    #[test]
    fn first_branch_places_root_and_clears_seed() {
        let mut world = world_with("Hello world");
        let plant = planted(&mut world, "Seed");
        let root = world.branch_plant(&plant).unwrap().unwrap();

        let root = world.get(&root).unwrap();
        assert_eq!(root.as_word().unwrap().text(), "Seed");
        assert!(root.as_word().unwrap().parent().is_none());
        // Straight up from the plant, (4 + 1) * 5 + 15 units away.
        assert!((root.pos().y - 60.0).abs() < 1e-3);
        assert!(root.pos().x.abs() < 1e-3);

        let p = world.get(&plant).unwrap();
        assert_eq!(p.as_plant().unwrap().text(), "");
        assert_eq!(p.diff()["text"], "");
        assert_eq!(p.as_plant().unwrap().words().len(), 1);
    }

    #[test]
    fn empty_seed_draws_starter() {
        let mut world = world_with("Hello world");
        let plant = planted(&mut world, "");
        let root = world.branch_plant(&plant).unwrap().unwrap();
        assert_eq!(world.get(&root).unwrap().as_word().unwrap().text(), "Hello");
    }

    #[test]
    fn word_grows_at_most_two_distinct_branches() {
        let mut world = world_with("Hello world Hello there Hello you Hello friend");
        let plant = planted(&mut world, "Hello");
        let root = world.branch_plant(&plant).unwrap().unwrap();

        for _ in 0..50 {
            world.branch_word(&root).unwrap();
        }
        let branches = world.get(&root).unwrap().as_word().unwrap().branches().to_vec();
        assert!(!branches.is_empty());
        assert!(branches.len() <= MAX_BRANCHES);

        let texts: Vec<&str> = branches
            .iter()
            .map(|b| world.get(b).unwrap().as_word().unwrap().text())
            .collect();
        if let [a, b] = texts.as_slice() {
            assert_ne!(a, b);
        }
        for b in &branches {
            let child = world.get(b).unwrap().as_word().unwrap();
            assert_eq!(child.context(), "Hello");
            assert_eq!(child.parent(), Some(&root));
        }
    }

    #[test]
    fn context_is_fixed_when_word_grows() {
        let mut world = world_with("Hello world Hello there");
        let plant = planted(&mut world, "Hello");
        let root = world.branch_plant(&plant).unwrap().unwrap();
        assert_eq!(world.get(&root).unwrap().as_word().unwrap().context(), "");

        let child = (0..50)
            .find_map(|_| world.branch_word(&root).unwrap())
            .unwrap();
        assert!(world.get_mut(&root).unwrap().set_text("Goodbye"));

        let child = world.get(&child).unwrap().as_word().unwrap();
        assert_eq!(child.context(), "Hello");
    }

    #[test]
    fn plant_stops_at_word_cap() {
        let corpus = "Alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu nu xi \
                      omicron pi rho sigma tau upsilon phi chi psi omega";
        let mut world = tuned(corpus, |s| s.max_plant_words = 5);
        let plant = planted(&mut world, "Alpha");
        for _ in 0..500 {
            world.branch_plant(&plant).unwrap();
        }
        let words = world.get(&plant).unwrap().as_plant().unwrap().words().len();
        assert!(words <= 5);
        assert!(words > 1);
    }

    #[test]
    fn removing_plant_removes_tree() {
        let mut world = world_with("Hello world Hello there");
        let plant = planted(&mut world, "Hello");
        for _ in 0..20 {
            world.branch_plant(&plant).unwrap();
        }
        assert!(world.entity_count() > 2);
        assert!(world.remove(&plant));
        assert_eq!(world.entity_count(), 0);
        assert!(world.plants().is_empty());
    }

    #[test]
    fn removing_word_prunes_subtree() {
        let mut world = world_with("Hello world Hello there");
        let plant = planted(&mut world, "Hello");
        let root = world.branch_plant(&plant).unwrap().unwrap();
        for _ in 0..20 {
            world.branch_plant(&plant).unwrap();
        }
        assert!(world.remove(&root));
        assert_eq!(world.entity_count(), 1);
        assert!(world.get(&plant).unwrap().as_plant().unwrap().words().is_empty());
    }

    #[test]
    fn unknown_plant_is_noop() {
        let mut world = world_with("Hello");
        assert_eq!(world.branch_plant(&EntityId::new("ghost")).unwrap(), None);
    }

    #[test]
    fn power_law_index_stays_in_range() {
        assert_eq!(power_law_index(0.0, 0.7, 10), 0);
        assert_eq!(power_law_index(1.0, 0.7, 10), 9);
        assert_eq!(power_law_index(0.5, 1.0, 4), 1);
        assert_eq!(power_law_index(0.999, 0.7, 1), 0);
    }

    #[test]
    fn tick_grows_on_interval() {
        let mut world = tuned("Hello world", |s| s.growth_interval_ticks = 3);
        let plant = planted(&mut world, "Hello");
        assert_eq!(world.tick().unwrap(), 0);
        assert_eq!(world.tick().unwrap(), 0);
        assert_eq!(world.tick().unwrap(), 1);
        assert_eq!(world.get(&plant).unwrap().as_plant().unwrap().words().len(), 1);
    }
}
