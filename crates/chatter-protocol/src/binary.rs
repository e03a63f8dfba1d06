//! Fixed-layout binary packets.
//!
//! A binary frame is one type-key byte followed by the packet's fields in
//! declaration order, big-endian, with no padding between fields. Strings
//! occupy a fixed number of bytes, NUL-padded on the right.
//!
//! Packet types are described by a static [`PacketLayout`] and collected in
//! a [`PacketRegistry`], which refuses to build if any layout is
//! inconsistent. The registry is built once at startup and shared.

use std::collections::BTreeMap;

use crate::ProtocolError;

/// Width and encoding of one packet field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// 32-bit IEEE float.
    F32,
    /// Unsigned byte.
    U8,
    /// Unsigned 16-bit integer.
    U16,
    /// Unsigned 32-bit integer.
    U32,
    /// UTF-8 string in exactly this many bytes, NUL-padded.
    Str(usize),
}

impl FieldKind {
    /// Encoded width in bytes.
    pub const fn width(self) -> usize {
        match self {
            Self::F32 | Self::U32 => 4,
            Self::U8 => 1,
            Self::U16 => 2,
            Self::Str(n) => n,
        }
    }
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// A float field.
    F32(f32),
    /// A byte field.
    U8(u8),
    /// A 16-bit field.
    U16(u16),
    /// A 32-bit field.
    U32(u32),
    /// A string field with trailing NULs stripped.
    Str(String),
}

/// Static description of one packet type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketLayout {
    /// Type key (first byte of every frame of this type).
    pub key: u8,
    /// Human-readable name used in logs and errors.
    pub name: &'static str,
    /// Field names in wire order.
    pub fields: &'static [&'static str],
    /// Field kinds in wire order, parallel to `fields`.
    pub kinds: &'static [FieldKind],
}

impl PacketLayout {
    /// Size of the body (everything after the key byte).
    pub fn body_len(&self) -> usize {
        self.kinds.iter().map(|k| k.width()).sum()
    }

    /// Encode `values` against this layout, key byte included.
    pub fn encode(&self, values: &[FieldValue]) -> Result<Vec<u8>, ProtocolError> {
        let mut out = Vec::with_capacity(self.body_len().saturating_add(1));
        out.push(self.key);

        if values.len() != self.kinds.len() {
            return Err(ProtocolError::BadLength {
                name: self.name,
                expected: self.kinds.len(),
                actual: values.len(),
            });
        }

        for ((name, kind), value) in self.fields.iter().zip(self.kinds).zip(values) {
            match (kind, value) {
                (FieldKind::F32, FieldValue::F32(v)) => out.extend_from_slice(&v.to_be_bytes()),
                (FieldKind::U8, FieldValue::U8(v)) => out.push(*v),
                (FieldKind::U16, FieldValue::U16(v)) => out.extend_from_slice(&v.to_be_bytes()),
                (FieldKind::U32, FieldValue::U32(v)) => out.extend_from_slice(&v.to_be_bytes()),
                (FieldKind::Str(width), FieldValue::Str(s)) => {
                    let bytes = s.as_bytes();
                    let used = bytes.len().min(*width);
                    out.extend_from_slice(bytes.get(..used).unwrap_or_default());
                    out.resize(out.len().saturating_add(width.saturating_sub(used)), 0);
                }
                _ => {
                    return Err(ProtocolError::FieldType {
                        name: self.name,
                        field: name,
                    });
                }
            }
        }
        Ok(out)
    }

    /// Decode a body (the bytes after the key) into field values.
    pub fn decode_body(&self, body: &[u8]) -> Result<Vec<FieldValue>, ProtocolError> {
        let expected = self.body_len();
        if body.len() != expected {
            return Err(ProtocolError::BadLength {
                name: self.name,
                expected,
                actual: body.len(),
            });
        }

        let mut rest = body;
        let mut values = Vec::with_capacity(self.kinds.len());
        for kind in self.kinds {
            let (chunk, tail) =
                rest.split_at_checked(kind.width())
                    .ok_or(ProtocolError::BadLength {
                        name: self.name,
                        expected,
                        actual: body.len(),
                    })?;
            rest = tail;
            values.push(decode_field(*kind, chunk));
        }
        Ok(values)
    }
}

fn decode_field(kind: FieldKind, chunk: &[u8]) -> FieldValue {
    match kind {
        FieldKind::F32 => FieldValue::F32(f32::from_be_bytes(fixed(chunk))),
        FieldKind::U8 => FieldValue::U8(chunk.first().copied().unwrap_or_default()),
        FieldKind::U16 => FieldValue::U16(u16::from_be_bytes(fixed(chunk))),
        FieldKind::U32 => FieldValue::U32(u32::from_be_bytes(fixed(chunk))),
        FieldKind::Str(_) => {
            let end = chunk.iter().position(|b| *b == 0).unwrap_or(chunk.len());
            FieldValue::Str(String::from_utf8_lossy(chunk.get(..end).unwrap_or_default()).into_owned())
        }
    }
}

/// Copy a correctly-sized chunk into an array; callers have already
/// checked the width.
fn fixed<const N: usize>(chunk: &[u8]) -> [u8; N] {
    let mut buf = [0u8; N];
    for (dst, src) in buf.iter_mut().zip(chunk) {
        *dst = *src;
    }
    buf
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Table of packet layouts keyed by type key.
#[derive(Debug, Clone, Default)]
pub struct PacketRegistry {
    by_key: BTreeMap<u8, PacketLayout>,
}

impl PacketRegistry {
    /// Build a registry, validating every layout.
    ///
    /// Fails if any layout's field names and kinds differ in length or if
    /// two layouts share a key.
    pub fn new(layouts: impl IntoIterator<Item = PacketLayout>) -> Result<Self, ProtocolError> {
        let mut by_key = BTreeMap::new();
        for layout in layouts {
            if layout.fields.len() != layout.kinds.len() {
                return Err(ProtocolError::LayoutMismatch {
                    key: layout.key,
                    name: layout.name,
                    names: layout.fields.len(),
                    kinds: layout.kinds.len(),
                });
            }
            if let Some(existing) = by_key.insert(layout.key, layout) {
                return Err(ProtocolError::DuplicateKey {
                    key: layout.key,
                    first: existing.name,
                    second: layout.name,
                });
            }
        }
        Ok(Self { by_key })
    }

    /// Registry of every packet [`BinaryPacket`] can represent.
    pub fn standard() -> Result<Self, ProtocolError> {
        Self::new(BinaryPacket::LAYOUTS)
    }

    /// Layout registered under `key`.
    pub fn layout(&self, key: u8) -> Option<&PacketLayout> {
        self.by_key.get(&key)
    }

    /// Number of registered layouts.
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    /// Whether no layouts are registered.
    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Split a frame into its layout and raw field values.
    pub fn decode_values(&self, frame: &[u8]) -> Result<(&PacketLayout, Vec<FieldValue>), ProtocolError> {
        let (key, body) = frame.split_first().ok_or(ProtocolError::EmptyFrame)?;
        let layout = self.layout(*key).ok_or(ProtocolError::UnknownKey(*key))?;
        let values = layout.decode_body(body)?;
        Ok((layout, values))
    }

    /// Decode a frame into a typed packet.
    pub fn decode(&self, frame: &[u8]) -> Result<BinaryPacket, ProtocolError> {
        let (layout, values) = self.decode_values(frame)?;
        BinaryPacket::from_values(layout, values)
    }

    /// Encode a typed packet. Fails if its type was not registered.
    pub fn encode(&self, packet: &BinaryPacket) -> Result<Vec<u8>, ProtocolError> {
        let key = packet.layout().key;
        let layout = self.layout(key).ok_or(ProtocolError::UnknownKey(key))?;
        layout.encode(&packet.values())
    }
}

// ---------------------------------------------------------------------------
// Typed packets
// ---------------------------------------------------------------------------

/// Width of the `face` string in player packets.
pub const FACE_WIDTH: usize = 5;

const XY: &[&str] = &["x", "y"];
const XY_FACE: &[&str] = &["x", "y", "face"];
const FACE: &[&str] = &["face"];
const XY_KINDS: &[FieldKind] = &[FieldKind::F32, FieldKind::F32];
const XY_FACE_KINDS: &[FieldKind] = &[FieldKind::F32, FieldKind::F32, FieldKind::Str(FACE_WIDTH)];
const FACE_KINDS: &[FieldKind] = &[FieldKind::Str(FACE_WIDTH)];

/// `C_MoveToPos`: client asks to move its avatar.
pub const MOVE_TO_POS: PacketLayout = PacketLayout {
    key: 1,
    name: "C_MoveToPos",
    fields: XY,
    kinds: XY_KINDS,
};

/// `S_SpawnPlayer`: tells a client where its own avatar spawned.
pub const SPAWN_PLAYER: PacketLayout = PacketLayout {
    key: 100,
    name: "S_SpawnPlayer",
    fields: XY_FACE,
    kinds: XY_FACE_KINDS,
};

/// `S_MovePlayer`: some avatar moved.
pub const MOVE_PLAYER: PacketLayout = PacketLayout {
    key: 101,
    name: "S_MovePlayer",
    fields: XY_FACE,
    kinds: XY_FACE_KINDS,
};

/// `S_AddPlayer`: another avatar joined.
pub const ADD_PLAYER: PacketLayout = PacketLayout {
    key: 102,
    name: "S_AddPlayer",
    fields: XY_FACE,
    kinds: XY_FACE_KINDS,
};

/// `S_RemovePlayer`: another avatar left.
pub const REMOVE_PLAYER: PacketLayout = PacketLayout {
    key: 103,
    name: "S_RemovePlayer",
    fields: FACE,
    kinds: FACE_KINDS,
};

/// The legacy position-sync packets.
#[derive(Debug, Clone, PartialEq)]
pub enum BinaryPacket {
    /// Client-to-server move request.
    MoveToPos {
        /// Target x.
        x: f32,
        /// Target y.
        y: f32,
    },
    /// The receiving client's own avatar spawned.
    SpawnPlayer {
        /// Spawn x.
        x: f32,
        /// Spawn y.
        y: f32,
        /// Avatar face (truncated to [`FACE_WIDTH`] bytes on the wire).
        face: String,
    },
    /// Another avatar joined.
    AddPlayer {
        /// Avatar x.
        x: f32,
        /// Avatar y.
        y: f32,
        /// Avatar face.
        face: String,
    },
    /// An avatar moved.
    MovePlayer {
        /// New x.
        x: f32,
        /// New y.
        y: f32,
        /// Avatar face.
        face: String,
    },
    /// An avatar left.
    RemovePlayer {
        /// Avatar face.
        face: String,
    },
}

impl BinaryPacket {
    /// Every layout this enum covers.
    pub const LAYOUTS: [PacketLayout; 5] = [MOVE_TO_POS, SPAWN_PLAYER, MOVE_PLAYER, ADD_PLAYER, REMOVE_PLAYER];

    /// The layout this packet encodes with.
    pub const fn layout(&self) -> &'static PacketLayout {
        match self {
            Self::MoveToPos { .. } => &MOVE_TO_POS,
            Self::SpawnPlayer { .. } => &SPAWN_PLAYER,
            Self::AddPlayer { .. } => &ADD_PLAYER,
            Self::MovePlayer { .. } => &MOVE_PLAYER,
            Self::RemovePlayer { .. } => &REMOVE_PLAYER,
        }
    }

    /// Field values in wire order.
    pub fn values(&self) -> Vec<FieldValue> {
        match self {
            Self::MoveToPos { x, y } => vec![FieldValue::F32(*x), FieldValue::F32(*y)],
            Self::SpawnPlayer { x, y, face }
            | Self::AddPlayer { x, y, face }
            | Self::MovePlayer { x, y, face } => vec![
                FieldValue::F32(*x),
                FieldValue::F32(*y),
                FieldValue::Str(face.clone()),
            ],
            Self::RemovePlayer { face } => vec![FieldValue::Str(face.clone())],
        }
    }

    /// Rebuild a typed packet from decoded values.
    pub fn from_values(layout: &PacketLayout, values: Vec<FieldValue>) -> Result<Self, ProtocolError> {
        use FieldValue::{Str, F32};

        let mut values = values.into_iter();
        let packet = match (layout.key, values.next(), values.next(), values.next()) {
            (1, Some(F32(x)), Some(F32(y)), None) => Self::MoveToPos { x, y },
            (100, Some(F32(x)), Some(F32(y)), Some(Str(face))) => Self::SpawnPlayer { x, y, face },
            (101, Some(F32(x)), Some(F32(y)), Some(Str(face))) => Self::MovePlayer { x, y, face },
            (102, Some(F32(x)), Some(F32(y)), Some(Str(face))) => Self::AddPlayer { x, y, face },
            (103, Some(Str(face)), None, None) => Self::RemovePlayer { face },
            (1 | 100..=103, ..) => return Err(ProtocolError::ValueMismatch { name: layout.name }),
            (key, ..) => return Err(ProtocolError::UnknownKey(key)),
        };
        if values.next().is_some() {
            return Err(ProtocolError::ValueMismatch { name: layout.name });
        }
        Ok(packet)
    }
}
