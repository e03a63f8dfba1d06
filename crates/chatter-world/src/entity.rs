//! Entities and their per-kind state.
//!
//! An [`Entity`] is the unit of replication. Besides its own state it
//! carries three pieces of bookkeeping:
//!
//! - `diff` -- fields changed since the last end-of-tick swap.
//! - `seen_by` -- sessions that received a full snapshot before the
//!   current tick and may therefore be sent diffs.
//! - `temp_seen_by` -- sessions served during the current tick; becomes
//!   `seen_by` at the swap.
//!
//! Every state change goes through a setter that also writes the field
//! into `diff`, so the two can never drift apart.

use std::collections::BTreeSet;

use chatter_ledger::{AntLedger, Gut, Speech, TextAct};
use chatter_types::{BellType, EntityId, EntityKind, FieldMap, Point, SessionId};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::WorldError;

// ---------------------------------------------------------------------------
// Kind state
// ---------------------------------------------------------------------------

/// A client-controlled avatar.
#[derive(Debug, Clone)]
pub struct Ant {
    face: SessionId,
    ledger: AntLedger,
    bell_type: BellType,
    correcting: bool,
}

impl Ant {
    /// The session identifier shown on this ant.
    pub const fn face(&self) -> &SessionId {
        &self.face
    }

    /// Gut, speech and totals.
    pub const fn ledger(&self) -> &AntLedger {
        &self.ledger
    }

    /// Current bell type.
    pub const fn bell_type(&self) -> BellType {
        self.bell_type
    }

    /// Whether the controlling client is being sent authoritative state
    /// this tick.
    pub const fn is_correcting(&self) -> bool {
        self.correcting
    }
}

/// The root of a word tree.
#[derive(Debug, Clone)]
pub struct Plant {
    pub(crate) text: String,
    pub(crate) words: Vec<EntityId>,
}

impl Plant {
    /// Seed text. Cleared once the root word has grown.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Every word in this plant's tree, in growth order.
    pub fn words(&self) -> &[EntityId] {
        &self.words
    }
}

/// One word in a plant's tree.
#[derive(Debug, Clone)]
pub struct Word {
    pub(crate) text: String,
    pub(crate) branches: Vec<EntityId>,
    pub(crate) plant: EntityId,
    pub(crate) parent: Option<EntityId>,
    pub(crate) context: String,
}

impl Word {
    /// The word itself.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Child words (at most two).
    pub fn branches(&self) -> &[EntityId] {
        &self.branches
    }

    /// The plant this word belongs to.
    pub const fn plant(&self) -> &EntityId {
        &self.plant
    }

    /// Parent word, `None` for the root.
    pub const fn parent(&self) -> Option<&EntityId> {
        self.parent.as_ref()
    }

    /// The preceding word used as bigram context when growing from here.
    pub fn context(&self) -> &str {
        &self.context
    }
}

/// Static terrain rectangle.
#[derive(Debug, Clone, Copy)]
pub struct TerrBlock {
    scale: Point,
}

impl TerrBlock {
    /// Width and height.
    pub const fn scale(&self) -> Point {
        self.scale
    }
}

/// A user-placed text box.
#[derive(Debug, Clone)]
pub struct TextBox {
    text: String,
}

impl TextBox {
    /// Box contents.
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Kind-specific state of an entity.
#[derive(Debug, Clone)]
pub enum Body {
    /// See [`Ant`].
    Ant(Ant),
    /// See [`Plant`].
    Plant(Plant),
    /// See [`Word`].
    Word(Word),
    /// See [`TerrBlock`].
    TerrBlock(TerrBlock),
    /// See [`TextBox`].
    Box(TextBox),
}

impl Body {
    /// The kind tag.
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Ant(_) => EntityKind::Ant,
            Self::Plant(_) => EntityKind::Plant,
            Self::Word(_) => EntityKind::Word,
            Self::TerrBlock(_) => EntityKind::TerrBlock,
            Self::Box(_) => EntityKind::Box,
        }
    }

    fn write_fields(&self, out: &mut FieldMap) {
        match self {
            Self::Ant(ant) => {
                out.insert("face".into(), json!(ant.face));
                out.insert("gut".into(), field(ant.ledger.gut()));
                out.insert("speech".into(), field(ant.ledger.speech()));
                out.insert("bellType".into(), field(&ant.bell_type));
            }
            Self::Plant(Plant { text, .. })
            | Self::Word(Word { text, .. })
            | Self::Box(TextBox { text }) => {
                out.insert("text".into(), json!(text));
            }
            Self::TerrBlock(block) => {
                out.insert("scale".into(), point(block.scale));
            }
        }
    }
}

fn field<T: Serialize + ?Sized>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn point(p: Point) -> Value {
    json!([p.x, p.y])
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A replicated object in a world.
#[derive(Debug, Clone)]
pub struct Entity {
    id: EntityId,
    pos: Point,
    rot: f32,
    body: Body,
    diff: FieldMap,
    pub(crate) seen_by: BTreeSet<SessionId>,
    pub(crate) temp_seen_by: BTreeSet<SessionId>,
}

impl Entity {
    /// Create an entity. Every field starts out in `diff`.
    pub fn new(id: EntityId, pos: Point, rot: f32, body: Body) -> Self {
        let mut entity = Self {
            id,
            pos,
            rot,
            body,
            diff: FieldMap::new(),
            seen_by: BTreeSet::new(),
            temp_seen_by: BTreeSet::new(),
        };
        entity.diff = entity.data();
        entity
    }

    /// A fresh ant for `face` with an empty ledger.
    pub fn ant(face: SessionId, pos: Point) -> Self {
        Self::new(
            EntityId::random(),
            pos,
            0.0,
            Body::Ant(Ant {
                face,
                ledger: AntLedger::new(),
                bell_type: BellType::default(),
                correcting: false,
            }),
        )
    }

    /// A plant seeded with `text` (may be empty).
    pub fn plant(pos: Point, rot: f32, text: impl Into<String>) -> Self {
        Self::new(
            EntityId::random(),
            pos,
            rot,
            Body::Plant(Plant {
                text: text.into(),
                words: Vec::new(),
            }),
        )
    }

    pub(crate) fn word(
        pos: Point,
        rot: f32,
        text: String,
        plant: EntityId,
        parent: Option<EntityId>,
        context: String,
    ) -> Self {
        Self::new(
            EntityId::random(),
            pos,
            rot,
            Body::Word(Word {
                text,
                branches: Vec::new(),
                plant,
                parent,
                context,
            }),
        )
    }

    /// A terrain block of the given size.
    pub fn terr_block(pos: Point, rot: f32, scale: Point) -> Self {
        Self::new(EntityId::random(), pos, rot, Body::TerrBlock(TerrBlock { scale }))
    }

    /// A text box.
    pub fn text_box(pos: Point, rot: f32, text: impl Into<String>) -> Self {
        Self::new(
            EntityId::random(),
            pos,
            rot,
            Body::Box(TextBox { text: text.into() }),
        )
    }

    // ---- Accessors ----

    /// Unique id.
    pub const fn id(&self) -> &EntityId {
        &self.id
    }

    /// Kind tag.
    pub const fn kind(&self) -> EntityKind {
        self.body.kind()
    }

    /// Position.
    pub const fn pos(&self) -> Point {
        self.pos
    }

    /// Rotation in radians.
    pub const fn rot(&self) -> f32 {
        self.rot
    }

    /// Kind-specific state.
    pub const fn body(&self) -> &Body {
        &self.body
    }

    /// Ant state, if this is an ant.
    pub const fn as_ant(&self) -> Option<&Ant> {
        match &self.body {
            Body::Ant(ant) => Some(ant),
            _ => None,
        }
    }

    /// Plant state, if this is a plant.
    pub const fn as_plant(&self) -> Option<&Plant> {
        match &self.body {
            Body::Plant(plant) => Some(plant),
            _ => None,
        }
    }

    /// Word state, if this is a word.
    pub const fn as_word(&self) -> Option<&Word> {
        match &self.body {
            Body::Word(word) => Some(word),
            _ => None,
        }
    }

    pub(crate) const fn plant_mut(&mut self) -> Option<&mut Plant> {
        match &mut self.body {
            Body::Plant(plant) => Some(plant),
            _ => None,
        }
    }

    pub(crate) const fn word_mut(&mut self) -> Option<&mut Word> {
        match &mut self.body {
            Body::Word(word) => Some(word),
            _ => None,
        }
    }

    pub(crate) fn into_body(self) -> Body {
        self.body
    }

    /// Full snapshot of every replicated field.
    pub fn data(&self) -> FieldMap {
        let mut out = FieldMap::new();
        out.insert("type".into(), json!(self.kind().as_str()));
        out.insert("pos".into(), point(self.pos));
        out.insert("rot".into(), json!(self.rot));
        self.body.write_fields(&mut out);
        out
    }

    /// Fields changed since the last swap.
    pub const fn diff(&self) -> &FieldMap {
        &self.diff
    }

    /// Sessions that had seen this entity before the current tick.
    pub const fn seen_by(&self) -> &BTreeSet<SessionId> {
        &self.seen_by
    }

    // ---- Mutation ----

    fn touch(&mut self, key: &str, value: Value) {
        self.diff.insert(key.to_owned(), value);
    }

    /// Move the entity.
    pub fn set_pos(&mut self, pos: Point) {
        self.pos = pos;
        self.touch("pos", point(pos));
    }

    /// Rotate the entity.
    pub fn set_rot(&mut self, rot: f32) {
        self.rot = rot;
        self.touch("rot", json!(rot));
    }

    /// Replace the text of a plant, word or box. Returns `false` for kinds
    /// without text.
    pub fn set_text(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        let slot = match &mut self.body {
            Body::Plant(Plant { text: slot, .. })
            | Body::Word(Word { text: slot, .. })
            | Body::Box(TextBox { text: slot }) => slot,
            Body::Ant(_) | Body::TerrBlock(_) => return false,
        };
        slot.clone_from(&text);
        self.touch("text", json!(text));
        true
    }

    fn ant_mut(&mut self) -> Result<&mut Ant, WorldError> {
        match &mut self.body {
            Body::Ant(ant) => Ok(ant),
            _ => Err(WorldError::WrongKind {
                id: self.id.clone(),
                expected: "ant",
            }),
        }
    }

    /// Change an ant's bell type.
    pub fn set_bell_type(&mut self, bell_type: BellType) -> Result<(), WorldError> {
        self.ant_mut()?.bell_type = bell_type;
        self.touch("bellType", field(&bell_type));
        Ok(())
    }

    /// Apply a batch of text acts to an ant, all or nothing.
    ///
    /// Successful acts are appended to `diff["acts"]` so observers can
    /// replay them. A rejected batch leaves the ledger untouched and puts
    /// the ant into correction.
    pub fn apply_text_acts(&mut self, acts: &[TextAct]) -> Result<(), WorldError> {
        let result = self.ant_mut()?.ledger.apply_batch(acts);
        if let Err((index, source)) = result {
            debug!(entity = %self.id, index, error = %source, "text act batch rejected");
            self.mark_correction()?;
            return Err(WorldError::TextActRejected { index, source });
        }

        let recorded = self
            .diff
            .entry("acts".to_owned())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(list) = recorded {
            list.extend(acts.iter().map(field));
        }
        Ok(())
    }

    /// Compare a client's claimed gut and speech against the ledger.
    ///
    /// On mismatch the ant enters correction. Returns whether the claim
    /// matched.
    pub fn check_claims(&mut self, gut: Option<&Gut>, speech: Option<&Speech>) -> Result<bool, WorldError> {
        let matches = self.ant_mut()?.ledger.matches(gut, speech);
        if !matches {
            debug!(entity = %self.id, "ledger claim mismatch");
            self.mark_correction()?;
        }
        Ok(matches)
    }

    /// Flag the ant as correcting and put its authoritative gut and speech
    /// into `diff`, so this tick's payload reaches its own client too.
    pub fn mark_correction(&mut self) -> Result<(), WorldError> {
        let ant = self.ant_mut()?;
        ant.correcting = true;
        let gut = field(ant.ledger.gut());
        let speech = field(ant.ledger.speech());
        self.touch("gut", gut);
        self.touch("speech", speech);
        Ok(())
    }

    /// Whether this is an ant in correction.
    pub const fn is_correcting(&self) -> bool {
        matches!(&self.body, Body::Ant(ant) if ant.correcting)
    }

    // ---- Replication bookkeeping ----

    /// Record that `session` was served this tick.
    pub(crate) fn mark_served(&mut self, session: &SessionId) {
        self.temp_seen_by.insert(session.clone());
    }

    /// End-of-tick swap: this tick's audience becomes the seen set, the
    /// diff is cleared and any correction ends.
    pub(crate) fn finish_tick(&mut self) {
        self.seen_by = std::mem::take(&mut self.temp_seen_by);
        self.diff.clear();
        if let Body::Ant(ant) = &mut self.body {
            ant.correcting = false;
        }
    }

    /// Drop `session` from both audience sets.
    pub(crate) fn forget_session(&mut self, session: &SessionId) {
        self.seen_by.remove(session);
        self.temp_seen_by.remove(session);
    }

    /// Every session that knows about this entity.
    pub(crate) fn audience(&self) -> BTreeSet<SessionId> {
        self.seen_by.union(&self.temp_seen_by).cloned().collect()
    }
}
