//! Per-tick replication.
//!
//! Each tick every session gets one payload per entity:
//!
//! | session has seen the entity | session controls it | payload |
//! |---|---|---|
//! | no  | -   | [`Payload::Full`] |
//! | yes | yes, not correcting | [`Payload::Suppressed`] |
//! | yes | otherwise | [`Payload::Diff`] |
//!
//! All payloads are computed before any entity's bookkeeping is swapped,
//! so every session sees the same diff for the same tick.

use std::collections::BTreeMap;

use chatter_protocol::ServerMessage;
use chatter_types::{EntityId, FieldMap, SessionId};

use crate::entity::Entity;
use crate::world::World;

/// What one session is sent for one entity this tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Complete data; the session has not seen the entity before.
    Full(FieldMap),
    /// Fields changed this tick.
    Diff(FieldMap),
    /// Nothing; the session predicts this entity itself.
    Suppressed,
}

impl Entity {
    /// The payload `session` should receive for this entity this tick.
    pub fn payload_for(&self, session: &SessionId, controlled: bool) -> Payload {
        if !self.seen_by.contains(session) {
            Payload::Full(self.data())
        } else if controlled && !self.is_correcting() {
            Payload::Suppressed
        } else {
            Payload::Diff(self.diff().clone())
        }
    }
}

/// Everything one session is sent for one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorldUpdate {
    /// Payload per entity.
    pub entities: BTreeMap<EntityId, Payload>,
    /// Entities the session had seen that are now gone.
    pub removed: Vec<EntityId>,
}

impl WorldUpdate {
    /// Wire form. Suppressed payloads and empty diffs are left out.
    pub fn into_message(self) -> ServerMessage {
        let entities = self
            .entities
            .into_iter()
            .filter_map(|(id, payload)| match payload {
                Payload::Full(data) => Some((id, data)),
                Payload::Diff(diff) if !diff.is_empty() => Some((id, diff)),
                Payload::Diff(_) | Payload::Suppressed => None,
            })
            .collect();
        ServerMessage::UpdateWorld {
            entities,
            removed: self.removed,
        }
    }
}

impl World {
    /// Compute this tick's update for every session, then run the
    /// end-of-tick swap on every entity.
    pub fn broadcast_tick(&mut self) -> BTreeMap<SessionId, WorldUpdate> {
        let audience: Vec<(SessionId, Option<EntityId>)> = self
            .controlled_by()
            .map(|(s, c)| (s.clone(), c.cloned()))
            .collect();

        let mut updates = BTreeMap::new();
        for (session, controlled) in &audience {
            let mut update = WorldUpdate::default();
            for (id, entity) in &mut self.entities {
                let own = controlled.as_ref() == Some(id);
                update.entities.insert(id.clone(), entity.payload_for(session, own));
                entity.mark_served(session);
            }
            update.removed = self
                .removals
                .iter()
                .filter(|r| r.audience.contains(session))
                .map(|r| r.id.clone())
                .collect();
            updates.insert(session.clone(), update);
        }

        for entity in self.entities.values_mut() {
            entity.finish_tick();
        }
        self.removals.clear();
        updates
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chatter_ledger::TextAct;
    use chatter_types::{Point, WorldId};
    use serde_json::json;

    use super::*;
    use crate::markov::MarkovSource;
    use crate::settings::WorldSettings;

    fn world() -> World {
        let settings = WorldSettings {
            seed: Some(42),
            ..WorldSettings::default()
        };
        World::new(WorldId::new("r"), settings, MarkovSource::new()).unwrap()
    }

    fn s(name: &str) -> SessionId {
        SessionId::new(name)
    }

    #[test]
    fn first_tick_is_full_then_diffs() {
        let mut world = world();
        let ant = world.add_client(&s("alice")).unwrap();
        let block = world
            .entities()
            .find(|(_, e)| e.kind() == chatter_types::EntityKind::TerrBlock)
            .map(|(id, _)| id.clone())
            .unwrap();

        let first = world.broadcast_tick().remove(&s("alice")).unwrap();
        assert!(first.entities.values().all(|p| matches!(p, Payload::Full(_))));
        assert!(matches!(first.entities.get(&ant), Some(Payload::Full(_))));

        world.get_mut(&block).unwrap().set_pos(Point::new(1.0, 1.0));
        let second = world.broadcast_tick().remove(&s("alice")).unwrap();
        let Some(Payload::Diff(diff)) = second.entities.get(&block) else {
            panic!("expected a diff for the moved block");
        };
        assert_eq!(diff.len(), 1);
        assert_eq!(diff["pos"], json!([1.0, 1.0]));
        assert_eq!(second.entities.get(&ant), Some(&Payload::Suppressed));
    }

    #[test]
    fn diff_is_cleared_after_swap() {
        let mut world = world();
        world.add_client(&s("alice")).unwrap();
        world.broadcast_tick();
        let boxed = Entity::text_box(Point::ZERO, 0.0, "x");
        let id = boxed.id().clone();
        world.add(boxed).unwrap();
        world.broadcast_tick();

        world.get_mut(&id).unwrap().set_text("y");
        world.broadcast_tick();
        let quiet = world.broadcast_tick().remove(&s("alice")).unwrap();
        assert_eq!(quiet.entities.get(&id), Some(&Payload::Diff(FieldMap::new())));
    }

    #[test]
    fn every_session_sees_same_diff() {
        let mut world = world();
        let alice_ant = world.add_client(&s("alice")).unwrap();
        world.add_client(&s("bob")).unwrap();
        world.broadcast_tick();

        world
            .get_mut(&alice_ant)
            .unwrap()
            .apply_text_acts(&[TextAct::Eat { letter: 'a' }])
            .unwrap();
        let mut updates = world.broadcast_tick();
        let bob = updates.remove(&s("bob")).unwrap();
        let alice = updates.remove(&s("alice")).unwrap();
        let Some(Payload::Diff(diff)) = bob.entities.get(&alice_ant) else {
            panic!("bob should get alice's acts");
        };
        assert_eq!(diff["acts"], json!([{"act": "eat", "letter": "a"}]));
        assert_eq!(alice.entities.get(&alice_ant), Some(&Payload::Suppressed));
    }

    #[test]
    fn correcting_ant_gets_its_own_diff() {
        let mut world = world();
        let ant = world.add_client(&s("alice")).unwrap();
        world.broadcast_tick();

        world.get_mut(&ant).unwrap().mark_correction().unwrap();
        let update = world.broadcast_tick().remove(&s("alice")).unwrap();
        let Some(Payload::Diff(diff)) = update.entities.get(&ant) else {
            panic!("correcting ant must not be suppressed");
        };
        assert!(diff.contains_key("gut"));
        assert!(diff.contains_key("speech"));

        let after = world.broadcast_tick().remove(&s("alice")).unwrap();
        assert_eq!(after.entities.get(&ant), Some(&Payload::Suppressed));
    }

    #[test]
    fn session_missing_a_tick_gets_full_again() {
        let mut world = world();
        let boxed = Entity::text_box(Point::ZERO, 0.0, "x");
        let id = boxed.id().clone();
        world.add(boxed).unwrap();
        world.add_client(&s("alice")).unwrap();
        world.broadcast_tick();
        assert!(world.get(&id).unwrap().seen_by().contains(&s("alice")));

        world.remove_client(&s("alice"));
        assert!(world.get(&id).unwrap().seen_by().is_empty());
        world.add_client(&s("alice")).unwrap();
        let update = world.broadcast_tick().remove(&s("alice")).unwrap();
        assert!(matches!(update.entities.get(&id), Some(Payload::Full(_))));
    }

    #[test]
    fn removals_reach_only_sessions_that_saw_them() {
        let mut world = world();
        world.add_client(&s("alice")).unwrap();
        let boxed = Entity::text_box(Point::ZERO, 0.0, "x");
        let id = boxed.id().clone();
        world.add(boxed).unwrap();
        world.broadcast_tick();

        world.add_client(&s("bob")).unwrap();
        world.remove(&id);
        let mut updates = world.broadcast_tick();
        assert_eq!(updates.remove(&s("alice")).unwrap().removed, vec![id]);
        assert!(updates.remove(&s("bob")).unwrap().removed.is_empty());

        let next = world.broadcast_tick().remove(&s("alice")).unwrap();
        assert!(next.removed.is_empty());
    }

    #[test]
    fn wire_form_drops_empty_entries() {
        let mut update = WorldUpdate::default();
        update.entities.insert(EntityId::new("a"), Payload::Suppressed);
        update.entities.insert(EntityId::new("b"), Payload::Diff(FieldMap::new()));
        let mut data = FieldMap::new();
        data.insert("type".into(), json!("box"));
        update.entities.insert(EntityId::new("c"), Payload::Full(data));

        let ServerMessage::UpdateWorld { entities, removed } = update.into_message() else {
            panic!("expected update-world");
        };
        assert_eq!(entities.keys().map(EntityId::as_str).collect::<Vec<_>>(), vec!["c"]);
        assert!(removed.is_empty());
    }
}
