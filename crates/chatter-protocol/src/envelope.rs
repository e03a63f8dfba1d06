//! JSON message envelope.
//!
//! Every JSON frame is a flat object whose `_type` field names its kind.
//! Server kinds start with `S_`, client kinds with `C_`.
//!
//! Decoding dispatches explicitly on `_type` before looking at any other
//! field, so an unknown kind is reported as [`ProtocolError::UnknownKind`]
//! rather than as a generic shape error.

use std::collections::BTreeMap;

use chatter_ledger::{Gut, Speech, TextAct};
use chatter_types::{BellType, EntityId, FieldMap, Point};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ProtocolError;

/// Name of the discriminator field.
pub const DISCRIMINATOR: &str = "_type";

// ---------------------------------------------------------------------------
// Server -> client
// ---------------------------------------------------------------------------

/// Messages the server sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "_type")]
pub enum ServerMessage {
    /// Full snapshot sent when a session enters a world.
    #[serde(rename = "S_OpenWorld")]
    OpenWorld {
        /// The entity this session controls.
        you: EntityId,
        /// Full data for every entity in the world.
        entities: BTreeMap<EntityId, FieldMap>,
    },
    /// The session has left the world it was in.
    #[serde(rename = "S_CloseWorld")]
    CloseWorld,
    /// Per-tick replication payload.
    #[serde(rename = "S_UpdateWorld")]
    UpdateWorld {
        /// Full data for unseen entities, diffs for seen ones.
        entities: BTreeMap<EntityId, FieldMap>,
        /// Entities removed since the previous tick.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        removed: Vec<EntityId>,
    },
}

impl ServerMessage {
    /// Serialize to a JSON text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a server frame. Used by clients and tests.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    /// The `_type` string this message is sent with.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::OpenWorld { .. } => "S_OpenWorld",
            Self::CloseWorld => "S_CloseWorld",
            Self::UpdateWorld { .. } => "S_UpdateWorld",
        }
    }
}

// ---------------------------------------------------------------------------
// Client -> server
// ---------------------------------------------------------------------------

/// `C_MoveToPos`: move the controlled ant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveToPos {
    /// Target position.
    pub pos: Point,
}

/// `C_UpdateSelf`: a batch of changes to the controlled ant.
///
/// Every field is optional. `gut` and `speech` are the client's *claim*
/// about its ledger, checked after `textActs` are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSelf {
    /// New position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<Point>,
    /// New rotation in radians.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rot: Option<f32>,
    /// Claimed speech.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speech: Option<Speech>,
    /// New bell type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bell_type: Option<BellType>,
    /// Claimed gut.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gut: Option<Gut>,
    /// Ledger operations to apply atomically, in order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_acts: Option<Vec<TextAct>>,
}

/// `C_MakeBox`: place a text box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MakeBox {
    /// Where to place it.
    pub pos: Point,
    /// Rotation in radians.
    #[serde(default)]
    pub rot: f32,
    /// Box contents.
    pub text: String,
}

/// `C_MakePlant`: plant a seed that grows words over time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MakePlant {
    /// Where to plant it.
    pub pos: Point,
    /// Rotation in radians.
    #[serde(default)]
    pub rot: f32,
    /// Seed word. Empty or absent means the plant picks its own.
    #[serde(default)]
    pub text: Option<String>,
}

/// Messages a client sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "_type")]
pub enum ClientMessage {
    /// See [`MoveToPos`].
    #[serde(rename = "C_MoveToPos")]
    MoveToPos(MoveToPos),
    /// See [`UpdateSelf`].
    #[serde(rename = "C_UpdateSelf")]
    UpdateSelf(UpdateSelf),
    /// See [`MakeBox`].
    #[serde(rename = "C_MakeBox")]
    MakeBox(MakeBox),
    /// See [`MakePlant`].
    #[serde(rename = "C_MakePlant")]
    MakePlant(MakePlant),
}

impl ClientMessage {
    /// Parse a client text frame.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let mut value: Value = serde_json::from_str(text)?;
        let object = value.as_object_mut().ok_or(ProtocolError::MissingDiscriminator)?;
        let kind = match object.remove(DISCRIMINATOR) {
            Some(Value::String(kind)) => kind,
            _ => return Err(ProtocolError::MissingDiscriminator),
        };

        let message = match kind.as_str() {
            "C_MoveToPos" => Self::MoveToPos(serde_json::from_value(value)?),
            "C_UpdateSelf" => Self::UpdateSelf(serde_json::from_value(value)?),
            "C_MakeBox" => Self::MakeBox(serde_json::from_value(value)?),
            "C_MakePlant" => Self::MakePlant(serde_json::from_value(value)?),
            _ => return Err(ProtocolError::UnknownKind(kind)),
        };
        Ok(message)
    }

    /// Serialize to a JSON text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use chatter_ledger::Segment;
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_update_self_with_text_acts() {
        let msg = ClientMessage::decode(
            r#"{"_type":"C_UpdateSelf","pos":[3,4],"bellType":"twelvetone",
                "textActs":[{"act":"eat","letter":"h"},{"act":"speak","letter":"h"},{"act":"unspeak"}]}"#,
        )
        .unwrap();
        let ClientMessage::UpdateSelf(update) = msg else {
            panic!("expected C_UpdateSelf");
        };
        assert_eq!(update.pos, Some(Point::new(3.0, 4.0)));
        assert_eq!(update.bell_type, Some(BellType::Twelvetone));
        assert_eq!(update.text_acts.as_ref().map(Vec::len), Some(3));
        assert!(update.gut.is_none());
    }

    #[test]
    fn decodes_claims() {
        let msg = ClientMessage::decode(
            r#"{"_type":"C_UpdateSelf","gut":{"a":2},"speech":[{"letter":"a"},"space"]}"#,
        )
        .unwrap();
        let ClientMessage::UpdateSelf(update) = msg else {
            panic!("expected C_UpdateSelf");
        };
        assert_eq!(update.gut.unwrap().count('a'), 2);
        assert_eq!(
            update.speech.unwrap().segments(),
            &[Segment::Letter('a'), Segment::Space]
        );
    }

    #[test]
    fn rejects_unknown_kind() {
        let err = ClientMessage::decode(r#"{"_type":"C_Teleport","pos":[0,0]}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownKind(kind) if kind == "C_Teleport"));
    }

    #[test]
    fn rejects_missing_discriminator() {
        assert!(matches!(
            ClientMessage::decode(r#"{"pos":[0,0]}"#),
            Err(ProtocolError::MissingDiscriminator)
        ));
        assert!(matches!(
            ClientMessage::decode("[1,2]"),
            Err(ProtocolError::MissingDiscriminator)
        ));
    }

    #[test]
    fn rejects_unknown_text_act() {
        let err = ClientMessage::decode(r#"{"_type":"C_UpdateSelf","textActs":[{"act":"juggle"}]}"#)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Json(_)));
    }

    #[test]
    fn make_plant_text_is_optional() {
        let msg = ClientMessage::decode(r#"{"_type":"C_MakePlant","pos":[1,1]}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::MakePlant(MakePlant {
                pos: Point::new(1.0, 1.0),
                rot: 0.0,
                text: None,
            })
        );
    }

    #[test]
    fn client_encoding_matches_decoding() {
        let msg = ClientMessage::MakeBox(MakeBox {
            pos: Point::new(2.0, 5.0),
            rot: 0.5,
            text: "hello".into(),
        });
        let text = msg.encode().unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["_type"], "C_MakeBox");
        assert_eq!(ClientMessage::decode(&text).unwrap(), msg);
    }

    #[test]
    fn server_messages_carry_type_tag() {
        let close = ServerMessage::CloseWorld.encode().unwrap();
        assert_eq!(close, r#"{"_type":"S_CloseWorld"}"#);

        let mut data = FieldMap::new();
        data.insert("type".into(), json!("box"));
        let id = EntityId::new("e1");
        let open = ServerMessage::OpenWorld {
            you: id.clone(),
            entities: BTreeMap::from([(id, data)]),
        };
        let value: Value = serde_json::from_str(&open.encode().unwrap()).unwrap();
        assert_eq!(value, json!({"_type": "S_OpenWorld", "you": "e1", "entities": {"e1": {"type": "box"}}}));
    }

    #[test]
    fn server_messages_decode_what_they_encode() {
        let mut ant = FieldMap::new();
        ant.insert("type".into(), json!("ant"));
        ant.insert("pos".into(), json!([10.0, 10.0]));
        let mut diff = FieldMap::new();
        diff.insert("speech".into(), json!(["space"]));
        let you = EntityId::new("ant-1");

        let messages = [
            ServerMessage::OpenWorld {
                you: you.clone(),
                entities: BTreeMap::from([(you.clone(), ant), (EntityId::new("t1"), FieldMap::new())]),
            },
            ServerMessage::UpdateWorld {
                entities: BTreeMap::from([(you, diff)]),
                removed: vec![EntityId::new("w7"), EntityId::new("w8")],
            },
            ServerMessage::CloseWorld,
        ];
        for message in messages {
            let text = message.encode().unwrap();
            let value: Value = serde_json::from_str(&text).unwrap();
            assert_eq!(value[DISCRIMINATOR], message.kind());
            assert_eq!(ServerMessage::decode(&text).unwrap(), message);
        }
    }

    #[test]
    fn client_messages_decode_what_they_encode() {
        let mut gut = Gut::new();
        gut.add('h').unwrap();
        gut.add('i').unwrap();
        let mut speech = Speech::new();
        speech.push(Segment::Letter('o'));
        speech.push(Segment::Space);
        speech.push(Segment::Untracked("hey".into()));

        let messages = [
            ClientMessage::MoveToPos(MoveToPos {
                pos: Point::new(-4.5, 8.0),
            }),
            ClientMessage::UpdateSelf(UpdateSelf {
                pos: Some(Point::new(1.0, 2.0)),
                rot: Some(0.25),
                speech: Some(speech),
                bell_type: Some(BellType::Twelvetone),
                gut: Some(gut),
                text_acts: Some(vec![
                    TextAct::Eat { letter: 'h' },
                    TextAct::Speak { letter: 'h' },
                    TextAct::Untracked { text: "!".into() },
                    TextAct::Unspeak,
                    TextAct::Clear,
                    TextAct::Destroy,
                ]),
            }),
            ClientMessage::UpdateSelf(UpdateSelf::default()),
            ClientMessage::MakePlant(MakePlant {
                pos: Point::new(3.0, 3.0),
                rot: 1.5,
                text: Some("seed".into()),
            }),
            ClientMessage::MakePlant(MakePlant {
                pos: Point::ZERO,
                rot: 0.0,
                text: None,
            }),
        ];
        for message in messages {
            let text = message.encode().unwrap();
            assert_eq!(ClientMessage::decode(&text).unwrap(), message);
        }
    }

    #[test]
    fn update_world_omits_empty_removed() {
        let update = ServerMessage::UpdateWorld {
            entities: BTreeMap::new(),
            removed: Vec::new(),
        };
        let text = update.encode().unwrap();
        assert_eq!(text, r#"{"_type":"S_UpdateWorld","entities":{}}"#);
        assert_eq!(ServerMessage::decode(&text).unwrap(), update);
    }
}
