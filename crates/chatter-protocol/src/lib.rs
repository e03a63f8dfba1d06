//! Wire encodings for the Chatter server.
//!
//! Clients speak one of two independent encodings:
//!
//! - **Binary framing** ([`binary`]) -- byte 0 is a registered type key and
//!   the rest is a fixed-layout big-endian record. Only the legacy
//!   position-sync packets use it.
//! - **JSON envelope** ([`envelope`]) -- a flat object whose `_type` field
//!   names the message kind. All world replication uses it.
//!
//! Both decode into [`ClientInput`], the single inbound type the rest of
//! the server deals with.

pub mod binary;
pub mod envelope;
pub mod error;

pub use binary::{BinaryPacket, FieldKind, FieldValue, PacketLayout, PacketRegistry};
pub use envelope::{ClientMessage, MakeBox, MakePlant, MoveToPos, ServerMessage, UpdateSelf};
pub use error::ProtocolError;

/// A decoded client frame, whichever encoding it arrived in.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientInput {
    /// A JSON envelope message.
    Json(ClientMessage),
    /// A legacy binary packet.
    Binary(BinaryPacket),
}
