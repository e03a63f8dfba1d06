//! The universe: every world plus the global session directory.
//!
//! The directory is what enforces "one connection per identifier". Each
//! entry remembers the [`ConnectionId`] that registered it, and teardown is
//! ignored unless it comes from that same connection.

use std::collections::BTreeMap;

use chatter_protocol::ClientInput;
use chatter_types::{ConnectionId, EntityId, SessionId, WorldId};
use chatter_world::{MarkovSource, Outgoing, World, WorldError};
use tracing::{debug, info, warn};

use crate::command::Command;
use crate::config::ChatterConfig;
use crate::session::{JoinOutcome, Outbound, Outbox};

/// Errors from universe operations.
#[derive(Debug, thiserror::Error)]
pub enum UniverseError {
    /// A world with this id already exists.
    #[error("world {0} is already in use")]
    DuplicateWorld(WorldId),

    /// No such world.
    #[error("unknown world: {0}")]
    UnknownWorld(WorldId),

    /// The session is not in the directory.
    #[error("unknown session: {0}")]
    UnknownSession(SessionId),

    /// The session is held by a different connection.
    #[error("session {0} is held by another connection")]
    StaleConnection(SessionId),

    /// The session is connected but in no world.
    #[error("session {0} has not joined a world")]
    NotJoined(SessionId),

    /// A world rejected the operation.
    #[error("world error: {0}")]
    World(#[from] WorldError),
}

/// Directory entry for a connected session.
#[derive(Debug)]
struct SessionEntry {
    connection: ConnectionId,
    outbox: Outbox,
    world: Option<WorldId>,
}

/// Counts from one universe tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Worlds ticked.
    pub worlds: usize,
    /// Words grown across all worlds.
    pub words_grown: usize,
    /// Worlds whose growth step failed.
    pub failed_worlds: usize,
    /// Update-world messages queued.
    pub updates_sent: usize,
    /// Sessions released because their outbox stalled.
    pub released: usize,
}

/// All worlds and connected sessions.
#[derive(Debug)]
pub struct Universe {
    worlds: BTreeMap<WorldId, World>,
    sessions: BTreeMap<SessionId, SessionEntry>,
    default_world: WorldId,
}

impl Universe {
    /// An empty universe whose default world is `default_world`. The world
    /// itself still has to be added.
    pub const fn new(default_world: WorldId) -> Self {
        Self {
            worlds: BTreeMap::new(),
            sessions: BTreeMap::new(),
            default_world,
        }
    }

    /// Build every configured world.
    pub fn from_config(config: &ChatterConfig) -> Result<Self, UniverseError> {
        let mut universe = Self::new(WorldId::new(config.default_world.as_str()));
        for world_config in &config.worlds {
            let markov = match &world_config.corpus_path {
                Some(path) => MarkovSource::from_file(path)?,
                None => MarkovSource::from_default_corpus()?,
            };
            let world = World::new(
                WorldId::new(world_config.id.as_str()),
                world_config.settings.clone(),
                markov,
            )?;
            universe.add_world(world)?;
        }
        if !universe.worlds.contains_key(&universe.default_world) {
            return Err(UniverseError::UnknownWorld(universe.default_world));
        }
        Ok(universe)
    }

    // ---- Worlds ----

    /// Register a world. Fails if its id is taken.
    pub fn add_world(&mut self, world: World) -> Result<(), UniverseError> {
        let id = world.id().clone();
        if self.worlds.contains_key(&id) {
            return Err(UniverseError::DuplicateWorld(id));
        }
        info!(world = %id, "world registered");
        self.worlds.insert(id, world);
        Ok(())
    }

    /// Look up a world.
    pub fn world(&self, id: &WorldId) -> Option<&World> {
        self.worlds.get(id)
    }

    /// Look up a world mutably.
    pub fn world_mut(&mut self, id: &WorldId) -> Option<&mut World> {
        self.worlds.get_mut(id)
    }

    /// The world sessions join when they do not name one.
    pub const fn default_world(&self) -> &WorldId {
        &self.default_world
    }

    /// Number of worlds.
    pub fn world_count(&self) -> usize {
        self.worlds.len()
    }

    // ---- Sessions ----

    /// Whether `session` is connected.
    pub fn is_connected(&self, session: &SessionId) -> bool {
        self.sessions.contains_key(session)
    }

    /// Number of connected sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// The world `session` is in.
    pub fn session_world(&self, session: &SessionId) -> Option<&WorldId> {
        self.sessions.get(session).and_then(|e| e.world.as_ref())
    }

    /// Register a session and join it to `world` (or the default world).
    ///
    /// A rejected session is not registered and nothing is sent to its
    /// outbox; the caller closes the socket with the outcome's reason.
    pub fn add_client(
        &mut self,
        session: &SessionId,
        connection: ConnectionId,
        outbox: Outbox,
        world: Option<&WorldId>,
    ) -> JoinOutcome {
        let target = world.unwrap_or(&self.default_world).clone();
        if self.sessions.contains_key(session) {
            info!(session = %session, "identifier already in use");
            return JoinOutcome::AlreadyInUse;
        }
        if !self.worlds.contains_key(&target) {
            info!(session = %session, world = %target, "join to unknown world");
            return JoinOutcome::UnknownWorld(target);
        }

        self.sessions.insert(
            session.clone(),
            SessionEntry {
                connection,
                outbox,
                world: None,
            },
        );
        match self.join_world(session, &target) {
            Ok(ant) => JoinOutcome::Joined { world: target, ant },
            Err(e) => {
                warn!(session = %session, error = %e, "join failed after registration");
                self.sessions.remove(session);
                JoinOutcome::WorldRejected(target)
            }
        }
    }

    /// Move a connected session into `target`, leaving its current world
    /// first. Joining the world it is already in changes nothing.
    ///
    /// Returns the session's ant in `target`.
    pub fn join_world(&mut self, session: &SessionId, target: &WorldId) -> Result<EntityId, UniverseError> {
        let Self { worlds, sessions, .. } = self;
        let entry = sessions
            .get(session)
            .ok_or_else(|| UniverseError::UnknownSession(session.clone()))?;
        if !worlds.contains_key(target) {
            return Err(UniverseError::UnknownWorld(target.clone()));
        }

        if let Some(current) = entry.world.clone() {
            if &current == target {
                return worlds
                    .get(target)
                    .and_then(|w| w.controlled(session))
                    .cloned()
                    .ok_or_else(|| UniverseError::NotJoined(session.clone()));
            }
            if let Some(old) = worlds.get_mut(&current) {
                old.remove_client(session);
                deliver(old, sessions);
            }
        }

        let world = worlds
            .get_mut(target)
            .ok_or_else(|| UniverseError::UnknownWorld(target.clone()))?;
        let joined = world.add_client(session);
        deliver(world, sessions);
        if let Some(entry) = sessions.get_mut(session) {
            entry.world = joined.is_ok().then(|| target.clone());
        }
        Ok(joined?)
    }

    /// Tear down a session if `connection` still holds it. Returns whether
    /// anything was removed.
    pub fn remove_client(&mut self, session: &SessionId, connection: ConnectionId) -> bool {
        let Self { worlds, sessions, .. } = self;
        let Some(entry) = sessions.get(session) else {
            return false;
        };
        if entry.connection != connection {
            debug!(session = %session, "ignoring teardown from stale connection");
            return false;
        }

        if let Some(world) = entry.world.clone().and_then(|id| worlds.get_mut(&id)) {
            world.remove_client(session);
            deliver(world, sessions);
        }
        sessions.remove(session);
        info!(session = %session, "session disconnected");
        true
    }

    /// Route a decoded frame to the sender's world.
    pub fn handle_input(
        &mut self,
        session: &SessionId,
        connection: ConnectionId,
        input: ClientInput,
    ) -> Result<(), UniverseError> {
        let Self { worlds, sessions, .. } = self;
        let entry = sessions
            .get(session)
            .ok_or_else(|| UniverseError::UnknownSession(session.clone()))?;
        if entry.connection != connection {
            return Err(UniverseError::StaleConnection(session.clone()));
        }
        let world_id = entry
            .world
            .clone()
            .ok_or_else(|| UniverseError::NotJoined(session.clone()))?;
        let world = worlds
            .get_mut(&world_id)
            .ok_or(UniverseError::UnknownWorld(world_id))?;

        let result = world.handle_input(session, input);
        deliver(world, sessions);
        Ok(result?)
    }

    // ---- Tick ----

    /// Tick every world and send each session its update.
    ///
    /// A world whose growth step fails still replicates and swaps.
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        let Self { worlds, sessions, .. } = self;

        for (id, world) in worlds.iter_mut() {
            report.worlds = report.worlds.saturating_add(1);
            match world.tick() {
                Ok(grown) => report.words_grown = report.words_grown.saturating_add(grown),
                Err(e) => {
                    warn!(world = %id, error = %e, "world tick failed");
                    report.failed_worlds = report.failed_worlds.saturating_add(1);
                }
            }

            deliver(world, sessions);
            for (session, update) in world.broadcast_tick() {
                if let Some(entry) = sessions.get(&session) {
                    entry.outbox.send(Outbound::Message(update.into_message()));
                    report.updates_sent = report.updates_sent.saturating_add(1);
                }
            }
        }

        let stalled: Vec<_> = self
            .sessions
            .iter()
            .filter(|(_, entry)| entry.outbox.is_stalled())
            .map(|(session, entry)| (session.clone(), entry.connection))
            .collect();
        for (session, connection) in stalled {
            warn!(session = %session, "releasing session with stalled outbox");
            if self.remove_client(&session, connection) {
                report.released = report.released.saturating_add(1);
            }
        }
        report
    }

    /// Apply one command from the queue.
    pub fn apply(&mut self, command: Command) {
        match command {
            Command::Connect {
                session,
                connection,
                world,
                outbox,
                reply,
            } => {
                let outcome = self.add_client(&session, connection, outbox, world.as_ref());
                if let Err(outcome) = reply.send(outcome) {
                    if outcome.is_joined() {
                        debug!(session = %session, "connection gone before join completed");
                        self.remove_client(&session, connection);
                    }
                }
            }
            Command::Inbound {
                session,
                connection,
                input,
            } => {
                if let Err(e) = self.handle_input(&session, connection, input) {
                    debug!(session = %session, error = %e, "input rejected");
                }
            }
            Command::Disconnect {
                session,
                connection,
            } => {
                self.remove_client(&session, connection);
            }
        }
    }
}

/// Hand everything `world` has queued to the recipients' outboxes.
fn deliver(world: &mut World, sessions: &BTreeMap<SessionId, SessionEntry>) {
    for envelope in world.drain_outgoing() {
        let Some(entry) = sessions.get(&envelope.to) else {
            continue;
        };
        let frame = match envelope.payload {
            Outgoing::Message(message) => Outbound::Message(message),
            Outgoing::Legacy(packet) => Outbound::Legacy(packet),
        };
        entry.outbox.send(frame);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chatter_world::WorldSettings;

    use super::*;

    fn world(id: &str) -> World {
        let settings = WorldSettings {
            seed: Some(42),
            ..WorldSettings::default()
        };
        World::new(WorldId::new(id), settings, MarkovSource::new()).unwrap()
    }

    #[test]
    fn duplicate_world_rejected() {
        let mut universe = Universe::new(WorldId::new("default"));
        universe.add_world(world("default")).unwrap();
        assert!(matches!(
            universe.add_world(world("default")),
            Err(UniverseError::DuplicateWorld(_))
        ));
        assert_eq!(universe.world_count(), 1);
    }

    #[test]
    fn stale_connection_cannot_send_input() {
        let mut universe = Universe::new(WorldId::new("default"));
        universe.add_world(world("default")).unwrap();
        let (outbox, _rx) = Outbox::channel();
        let alice = SessionId::new("alice");
        let holder = ConnectionId::new();
        assert!(universe.add_client(&alice, holder, outbox, None).is_joined());

        let err = universe
            .handle_input(
                &alice,
                ConnectionId::new(),
                ClientInput::Binary(chatter_protocol::BinaryPacket::MoveToPos { x: 0.0, y: 0.0 }),
            )
            .unwrap_err();
        assert!(matches!(err, UniverseError::StaleConnection(_)));
    }

    #[test]
    fn joining_same_world_is_idempotent() {
        let mut universe = Universe::new(WorldId::new("default"));
        universe.add_world(world("default")).unwrap();
        let (outbox, _rx) = Outbox::channel();
        let alice = SessionId::new("alice");
        let JoinOutcome::Joined { ant, .. } = universe.add_client(&alice, ConnectionId::new(), outbox, None)
        else {
            panic!("join failed");
        };
        let again = universe.join_world(&alice, &WorldId::new("default")).unwrap();
        assert_eq!(again, ant);
        assert_eq!(universe.world(&WorldId::new("default")).unwrap().client_count(), 1);
    }

    #[test]
    fn tick_with_no_sessions_still_ticks() {
        let mut universe = Universe::new(WorldId::new("default"));
        universe.add_world(world("default")).unwrap();
        let report = universe.tick();
        assert_eq!(report.worlds, 1);
        assert_eq!(report.updates_sent, 0);
        assert_eq!(universe.world(&WorldId::new("default")).unwrap().tick_count(), 1);
    }
}
