//! Error types for world operations.

use chatter_ledger::LedgerError;
use chatter_types::{EntityId, SessionId};

/// Errors that can occur when operating on a world.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// An entity with this id is already registered.
    #[error("duplicate entity: {0}")]
    DuplicateEntity(EntityId),

    /// The entity is not in the registry.
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// The entity exists but is not of the kind the operation needs.
    #[error("entity {id} is not a {expected}")]
    WrongKind {
        /// The entity.
        id: EntityId,
        /// The kind the operation expected.
        expected: &'static str,
    },

    /// The session is already a client of this world.
    #[error("session already in world: {0}")]
    DuplicateSession(SessionId),

    /// The session is not a client of this world.
    #[error("session not in world: {0}")]
    UnknownSession(SessionId),

    /// The session has no controlled entity to apply input to.
    #[error("session {0} controls no entity")]
    NoControlledEntity(SessionId),

    /// A client sent a packet only the server may send.
    #[error("unexpected client packet {0}")]
    UnexpectedPacket(&'static str),

    /// A text-act batch was rejected. Nothing in it was applied.
    #[error("text act {index} rejected: {source}")]
    TextActRejected {
        /// Position of the failing act in the batch.
        index: usize,
        /// Why it failed.
        source: LedgerError,
    },

    /// The corpus could not be read.
    #[error("corpus i/o error: {0}")]
    CorpusIo(#[from] std::io::Error),

    /// The tokenizer pattern failed to compile.
    #[error("tokenizer error: {0}")]
    Tokenizer(#[from] regex::Error),
}
