//! A single world: entity registry, client bindings and input handling.

use std::collections::{BTreeMap, BTreeSet};

use chatter_protocol::{
    BinaryPacket, ClientInput, ClientMessage, MakeBox, MakePlant, MoveToPos, ServerMessage, UpdateSelf,
};
use chatter_types::{EntityId, EntityKind, FieldMap, Point, SessionId, WorldId};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tracing::{debug, info, warn};

use crate::entity::{Body, Entity};
use crate::error::WorldError;
use crate::markov::MarkovSource;
use crate::outgoing::{Envelope, Outgoing};
use crate::settings::WorldSettings;
use crate::spatial::{NoIndex, SpatialIndex};
use crate::starting_world;

/// A session attached to this world.
#[derive(Debug, Clone, Default)]
struct Client {
    /// The entity this session's input is applied to.
    controlled: Option<EntityId>,
}

/// An entity removed this tick and the sessions that need telling.
#[derive(Debug, Clone)]
pub(crate) struct Removal {
    pub(crate) id: EntityId,
    pub(crate) audience: BTreeSet<SessionId>,
}

/// A world of replicated entities.
#[derive(Debug)]
pub struct World {
    id: WorldId,
    settings: WorldSettings,
    pub(crate) entities: BTreeMap<EntityId, Entity>,
    pub(crate) plants: Vec<EntityId>,
    clients: BTreeMap<SessionId, Client>,
    pub(crate) markov: MarkovSource,
    pub(crate) rng: SmallRng,
    ticks: u64,
    pub(crate) removals: Vec<Removal>,
    outgoing: Vec<Envelope>,
    index: Box<dyn SpatialIndex>,
}

impl World {
    /// Create a world and populate its terrain and startup plants.
    pub fn new(id: WorldId, settings: WorldSettings, markov: MarkovSource) -> Result<Self, WorldError> {
        let mut world = Self::empty(id, settings, markov);
        starting_world::populate(&mut world)?;
        info!(
            world = %world.id,
            entities = world.entities.len(),
            "world created"
        );
        Ok(world)
    }

    /// Create a world with no entities at all.
    pub fn empty(id: WorldId, settings: WorldSettings, markov: MarkovSource) -> Self {
        let rng = settings
            .seed
            .map_or_else(|| SmallRng::from_rng(&mut rand::rng()), SmallRng::seed_from_u64);
        Self {
            id,
            settings,
            entities: BTreeMap::new(),
            plants: Vec::new(),
            clients: BTreeMap::new(),
            markov,
            rng,
            ticks: 0,
            removals: Vec::new(),
            outgoing: Vec::new(),
            index: Box::new(NoIndex),
        }
    }

    /// Attach a spatial index. Existing entities are inserted into it.
    #[must_use]
    pub fn with_spatial_index(mut self, mut index: Box<dyn SpatialIndex>) -> Self {
        for (id, entity) in &self.entities {
            index.insert(id, entity.pos());
        }
        self.index = index;
        self
    }

    /// World id.
    pub const fn id(&self) -> &WorldId {
        &self.id
    }

    /// The settings this world was created with.
    pub const fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    /// Ticks run so far.
    pub const fn tick_count(&self) -> u64 {
        self.ticks
    }

    /// The world's text source.
    pub const fn markov(&self) -> &MarkovSource {
        &self.markov
    }

    // ---- Entity registry ----

    /// Register an entity. Fails if the id is taken.
    pub fn add(&mut self, entity: Entity) -> Result<(), WorldError> {
        let id = entity.id().clone();
        if self.entities.contains_key(&id) {
            return Err(WorldError::DuplicateEntity(id));
        }
        if entity.kind() == EntityKind::Plant {
            self.plants.push(id.clone());
        }
        self.index.insert(&id, entity.pos());
        self.entities.insert(id, entity);
        Ok(())
    }

    /// Remove an entity. Returns `false` if nothing was registered under
    /// `id`.
    ///
    /// Removing a plant removes its whole word tree; removing a word
    /// removes every word grown from it. Sessions that had seen any removed
    /// entity are told on the next update.
    pub fn remove(&mut self, id: &EntityId) -> bool {
        let Some(entity) = self.take_entity(id) else {
            return false;
        };

        match entity.into_body() {
            Body::Plant(plant) => {
                self.plants.retain(|p| p != id);
                for word in &plant.words {
                    self.take_entity(word);
                }
            }
            Body::Word(word) => {
                if let Some(parent) = word.parent.as_ref().and_then(|p| self.entities.get_mut(p)) {
                    if let Some(parent) = parent.word_mut() {
                        parent.branches.retain(|b| b != id);
                    }
                }
                let mut pending = word.branches;
                let mut gone = vec![id.clone()];
                while let Some(next) = pending.pop() {
                    if let Some(child) = self.take_entity(&next) {
                        if let Body::Word(child) = child.into_body() {
                            pending.extend(child.branches);
                        }
                    }
                    gone.push(next);
                }
                if let Some(plant) = self.entities.get_mut(&word.plant).and_then(Entity::plant_mut) {
                    plant.words.retain(|w| !gone.contains(w));
                }
            }
            Body::Ant(_) => {
                for client in self.clients.values_mut() {
                    if client.controlled.as_ref() == Some(id) {
                        client.controlled = None;
                    }
                }
            }
            Body::TerrBlock(_) | Body::Box(_) => {}
        }
        true
    }

    /// Unregister one entity without cascading, recording its removal.
    fn take_entity(&mut self, id: &EntityId) -> Option<Entity> {
        let entity = self.entities.remove(id)?;
        self.index.remove(id);
        self.removals.push(Removal {
            id: id.clone(),
            audience: entity.audience(),
        });
        Some(entity)
    }

    /// Look up an entity.
    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Look up an entity mutably.
    pub fn get_mut(&mut self, id: &EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &EntityId) -> bool {
        self.entities.contains_key(id)
    }

    /// Number of registered entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Iterate over all entities in id order.
    pub fn entities(&self) -> impl Iterator<Item = (&EntityId, &Entity)> {
        self.entities.iter()
    }

    /// Ids of every plant, in planting order.
    pub fn plants(&self) -> &[EntityId] {
        &self.plants
    }

    /// Full data of every entity.
    pub fn snapshot(&self) -> BTreeMap<EntityId, FieldMap> {
        self.entities
            .iter()
            .map(|(id, entity)| (id.clone(), entity.data()))
            .collect()
    }

    /// Move an entity, keeping the spatial index informed.
    pub fn move_entity(&mut self, id: &EntityId, pos: Point) -> Result<(), WorldError> {
        let entity = self
            .entities
            .get_mut(id)
            .ok_or_else(|| WorldError::EntityNotFound(id.clone()))?;
        entity.set_pos(pos);
        self.index.update(id, pos);
        Ok(())
    }

    /// Ids of entities within `radius` of `center`.
    pub fn entities_within(&self, center: Point, radius: f32) -> Vec<&EntityId> {
        let limit = radius * radius;
        self.entities
            .iter()
            .filter(|(_, e)| (e.pos() - center).sqr_magnitude() <= limit)
            .map(|(id, _)| id)
            .collect()
    }

    // ---- Clients ----

    /// Attach a session: spawn its ant, bind it, and queue a full snapshot.
    ///
    /// Returns the id of the new ant.
    pub fn add_client(&mut self, session: &SessionId) -> Result<EntityId, WorldError> {
        if self.clients.contains_key(session) {
            return Err(WorldError::DuplicateSession(session.clone()));
        }

        let spawn = self.settings.spawn_point;
        let ant = Entity::ant(session.clone(), spawn);
        let ant_id = ant.id().clone();
        self.add(ant)?;

        let others: Vec<SessionId> = self.clients.keys().cloned().collect();
        self.clients.insert(
            session.clone(),
            Client {
                controlled: Some(ant_id.clone()),
            },
        );

        let entities = self.snapshot();
        self.send(
            session,
            Outgoing::Message(ServerMessage::OpenWorld {
                you: ant_id.clone(),
                entities,
            }),
        );
        self.send(
            session,
            Outgoing::Legacy(BinaryPacket::SpawnPlayer {
                x: spawn.x,
                y: spawn.y,
                face: session.to_string(),
            }),
        );
        for other in &others {
            self.send(
                other,
                Outgoing::Legacy(BinaryPacket::AddPlayer {
                    x: spawn.x,
                    y: spawn.y,
                    face: session.to_string(),
                }),
            );
        }

        info!(world = %self.id, session = %session, ant = %ant_id, "client joined");
        Ok(ant_id)
    }

    /// Detach a session and remove its ant. Returns `false` if the session
    /// was not attached.
    pub fn remove_client(&mut self, session: &SessionId) -> bool {
        let Some(client) = self.clients.remove(session) else {
            return false;
        };

        if let Some(ant) = client.controlled {
            self.remove(&ant);
        }
        for entity in self.entities.values_mut() {
            entity.forget_session(session);
        }
        for removal in &mut self.removals {
            removal.audience.remove(session);
        }

        self.send(session, Outgoing::Message(ServerMessage::CloseWorld));
        let others: Vec<SessionId> = self.clients.keys().cloned().collect();
        for other in &others {
            self.send(
                other,
                Outgoing::Legacy(BinaryPacket::RemovePlayer {
                    face: session.to_string(),
                }),
            );
        }

        info!(world = %self.id, session = %session, "client left");
        true
    }

    /// Whether `session` is attached.
    pub fn has_client(&self, session: &SessionId) -> bool {
        self.clients.contains_key(session)
    }

    /// Number of attached sessions.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Attached sessions, in id order.
    pub fn sessions(&self) -> impl Iterator<Item = &SessionId> {
        self.clients.keys()
    }

    /// The entity `session` controls.
    pub fn controlled(&self, session: &SessionId) -> Option<&EntityId> {
        self.clients.get(session).and_then(|c| c.controlled.as_ref())
    }

    pub(crate) fn controlled_by(&self) -> impl Iterator<Item = (&SessionId, Option<&EntityId>)> {
        self.clients.iter().map(|(s, c)| (s, c.controlled.as_ref()))
    }

    fn controlled_ant(&self, session: &SessionId) -> Result<EntityId, WorldError> {
        let client = self
            .clients
            .get(session)
            .ok_or_else(|| WorldError::UnknownSession(session.clone()))?;
        client
            .controlled
            .clone()
            .ok_or_else(|| WorldError::NoControlledEntity(session.clone()))
    }

    // ---- Input ----

    /// Apply one decoded frame from `session`.
    pub fn handle_input(&mut self, session: &SessionId, input: ClientInput) -> Result<(), WorldError> {
        if !self.clients.contains_key(session) {
            return Err(WorldError::UnknownSession(session.clone()));
        }

        match input {
            ClientInput::Json(ClientMessage::MoveToPos(MoveToPos { pos })) => self.move_player(session, pos),
            ClientInput::Binary(BinaryPacket::MoveToPos { x, y }) => self.move_player(session, Point::new(x, y)),
            ClientInput::Binary(other) => Err(WorldError::UnexpectedPacket(other.layout().name)),
            ClientInput::Json(ClientMessage::UpdateSelf(update)) => self.update_self(session, update),
            ClientInput::Json(ClientMessage::MakeBox(MakeBox { pos, rot, text })) => {
                let entity = Entity::text_box(pos, rot, text);
                debug!(world = %self.id, session = %session, entity = %entity.id(), "box placed");
                self.add(entity)
            }
            ClientInput::Json(ClientMessage::MakePlant(MakePlant { pos, rot, text })) => {
                let entity = Entity::plant(pos, rot, text.unwrap_or_default());
                debug!(world = %self.id, session = %session, entity = %entity.id(), "plant placed");
                self.add(entity)
            }
        }
    }

    fn move_player(&mut self, session: &SessionId, pos: Point) -> Result<(), WorldError> {
        let ant = self.controlled_ant(session)?;
        self.move_entity(&ant, pos)?;

        let everyone: Vec<SessionId> = self.clients.keys().cloned().collect();
        for other in &everyone {
            self.send(
                other,
                Outgoing::Legacy(BinaryPacket::MovePlayer {
                    x: pos.x,
                    y: pos.y,
                    face: session.to_string(),
                }),
            );
        }
        Ok(())
    }

    /// Apply every present field of an update-self independently.
    ///
    /// Text acts run before the gut/speech claim is checked. A rejected
    /// batch is reported after the other fields have been applied.
    fn update_self(&mut self, session: &SessionId, update: UpdateSelf) -> Result<(), WorldError> {
        let ant_id = self.controlled_ant(session)?;
        if let Some(pos) = update.pos {
            self.move_entity(&ant_id, pos)?;
        }

        let ant = self
            .entities
            .get_mut(&ant_id)
            .ok_or_else(|| WorldError::EntityNotFound(ant_id.clone()))?;
        if let Some(rot) = update.rot {
            ant.set_rot(rot);
        }
        if let Some(bell_type) = update.bell_type {
            ant.set_bell_type(bell_type)?;
        }
        let acts = match &update.text_acts {
            Some(acts) if !acts.is_empty() => ant.apply_text_acts(acts),
            _ => Ok(()),
        };
        if update.gut.is_some() || update.speech.is_some() {
            ant.check_claims(update.gut.as_ref(), update.speech.as_ref())?;
        }
        acts
    }

    // ---- Tick ----

    /// Advance the tick counter and grow every plant when growth is due.
    ///
    /// Returns how many words grew. Every plant is attempted even if one
    /// fails; the first failure is returned.
    pub fn tick(&mut self) -> Result<usize, WorldError> {
        self.ticks = self.ticks.saturating_add(1);
        let due = self
            .ticks
            .checked_rem(self.settings.growth_interval_ticks)
            .is_some_and(|r| r == 0);
        if !due {
            return Ok(0);
        }

        let plants = self.plants.clone();
        let mut grown: usize = 0;
        let mut first_error = None;
        for plant in &plants {
            match self.branch_plant(plant) {
                Ok(Some(_)) => grown = grown.saturating_add(1),
                Ok(None) => {}
                Err(e) => {
                    warn!(world = %self.id, plant = %plant, error = %e, "plant growth failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(grown),
        }
    }

    // ---- Outgoing ----

    fn send(&mut self, to: &SessionId, payload: Outgoing) {
        self.outgoing.push(Envelope {
            to: to.clone(),
            payload,
        });
    }

    /// Take everything queued for delivery since the last drain.
    pub fn drain_outgoing(&mut self) -> Vec<Envelope> {
        std::mem::take(&mut self.outgoing)
    }
}
