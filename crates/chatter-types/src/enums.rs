//! Enumeration types shared across the workspace.

use serde::{Deserialize, Serialize};

/// The concrete kind of a replicated entity.
///
/// Serialized as the `type` field of every entity snapshot, which is how
/// clients pick the class used to render it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// A player avatar, one per connected session.
    Ant,
    /// The root of a procedurally grown word tree.
    Plant,
    /// One text fragment in a plant's word tree.
    Word,
    /// A static block of terrain.
    TerrBlock,
    /// A player-placed text box.
    Box,
}

impl EntityKind {
    /// Wire name of the kind, as it appears in the `type` field.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ant => "ant",
            Self::Plant => "plant",
            Self::Word => "word",
            Self::TerrBlock => "terrblock",
            Self::Box => "box",
        }
    }
}

impl core::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scale an ant's speech bells are tuned to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BellType {
    /// Five-note scale.
    #[default]
    Pentatonic,
    /// Chromatic twelve-tone scale.
    Twelvetone,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn kind_serializes_to_wire_name() {
        for kind in [
            EntityKind::Ant,
            EntityKind::Plant,
            EntityKind::Word,
            EntityKind::TerrBlock,
            EntityKind::Box,
        ] {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, serde_json::Value::from(kind.as_str()));
        }
    }

    #[test]
    fn unknown_bell_type_is_rejected() {
        assert!(serde_json::from_str::<BellType>("\"gamelan\"").is_err());
        assert_eq!(
            serde_json::from_str::<BellType>("\"twelvetone\"").unwrap(),
            BellType::Twelvetone
        );
    }
}
