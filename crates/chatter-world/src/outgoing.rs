//! Messages a world queues for its sessions.
//!
//! Worlds never talk to sockets. Whatever they want delivered is queued as
//! an [`Envelope`] and drained by the owner after each operation.

use chatter_protocol::{BinaryPacket, ServerMessage};
use chatter_types::SessionId;

/// Something to deliver to one session.
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    /// A JSON envelope message.
    Message(ServerMessage),
    /// A legacy binary packet, only forwarded to legacy sessions.
    Legacy(BinaryPacket),
}

/// An [`Outgoing`] addressed to a session.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Recipient.
    pub to: SessionId,
    /// What to deliver.
    pub payload: Outgoing,
}
