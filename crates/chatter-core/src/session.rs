//! What the universe sends back to a connection task.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chatter_protocol::{BinaryPacket, ServerMessage};
use chatter_types::{EntityId, WorldId};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, trace};

/// Close reason sent when the identifier is already connected.
pub const REASON_IN_USE: &str = "Face already in use";
/// Close reason sent when the requested world does not exist.
pub const REASON_UNKNOWN_WORLD: &str = "Unknown world";
/// Close reason sent when the handshake identifier is unusable.
pub const REASON_INVALID_IDENTIFIER: &str = "Invalid identifier";
/// Close reason sent when the world refused an otherwise valid join.
pub const REASON_JOIN_FAILED: &str = "Could not join world";

/// Frames a session may have queued before it counts as stalled
/// (about eight seconds of updates at 30 Hz).
pub const OUTBOX_CAPACITY: usize = 256;

/// A frame for a connection task to write to its socket.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// A JSON text frame.
    Message(ServerMessage),
    /// A binary frame; dropped unless the session is in legacy mode.
    Legacy(BinaryPacket),
}

/// Sending half of a session's outbound queue.
///
/// Sends never fail from the caller's point of view. A frame that finds
/// the queue full is dropped and the outbox is marked stalled; the
/// universe releases stalled sessions at the end of the tick.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::Sender<Outbound>,
    overflowed: Arc<AtomicBool>,
}

impl Outbox {
    /// A new outbox holding up to [`OUTBOX_CAPACITY`] frames and the
    /// receiver the connection task drains.
    pub fn channel() -> (Self, mpsc::Receiver<Outbound>) {
        Self::with_capacity(OUTBOX_CAPACITY)
    }

    /// A new outbox holding up to `capacity` frames (at least one).
    pub fn with_capacity(capacity: usize) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let outbox = Self {
            tx,
            overflowed: Arc::new(AtomicBool::new(false)),
        };
        (outbox, rx)
    }

    /// Queue a frame.
    pub fn send(&self, message: Outbound) {
        match self.tx.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                if !self.overflowed.swap(true, Ordering::Relaxed) {
                    debug!("outbox full, session stalled");
                }
            }
            Err(TrySendError::Closed(_)) => trace!("outbox closed, dropping frame"),
        }
    }

    /// Whether the session has stopped draining: its queue overflowed or
    /// the receiving side is gone.
    pub fn is_stalled(&self) -> bool {
        self.overflowed.load(Ordering::Relaxed) || self.tx.is_closed()
    }
}

/// Result of asking to join the universe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Joined; the open-world snapshot is already queued.
    Joined {
        /// World joined.
        world: WorldId,
        /// The ant this session controls.
        ant: EntityId,
    },
    /// Another connection holds this identifier.
    AlreadyInUse,
    /// No such world.
    UnknownWorld(WorldId),
    /// The world exists but refused the session.
    WorldRejected(WorldId),
}

impl JoinOutcome {
    /// Close reason for a failed join, `None` on success.
    pub const fn close_reason(&self) -> Option<&'static str> {
        match self {
            Self::Joined { .. } => None,
            Self::AlreadyInUse => Some(REASON_IN_USE),
            Self::UnknownWorld(_) => Some(REASON_UNKNOWN_WORLD),
            Self::WorldRejected(_) => Some(REASON_JOIN_FAILED),
        }
    }

    /// Whether the join succeeded.
    pub const fn is_joined(&self) -> bool {
        matches!(self, Self::Joined { .. })
    }
}
