//! Error types for the wire protocol.

/// Errors produced while building packet layouts or decoding frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A packet type declares a different number of field names than
    /// field kinds. Fatal when building a [`PacketRegistry`].
    ///
    /// [`PacketRegistry`]: crate::PacketRegistry
    #[error("packet {name} (key {key}) declares {names} field names but {kinds} field kinds")]
    LayoutMismatch {
        /// Packet type key.
        key: u8,
        /// Packet type name.
        name: &'static str,
        /// Number of declared field names.
        names: usize,
        /// Number of declared field kinds.
        kinds: usize,
    },

    /// Two packet types claim the same key.
    #[error("packet key {key} registered twice ({first} and {second})")]
    DuplicateKey {
        /// The contested key.
        key: u8,
        /// Name of the type registered first.
        first: &'static str,
        /// Name of the type that collided.
        second: &'static str,
    },

    /// A binary frame used a key nobody registered.
    #[error("unknown packet key {0}")]
    UnknownKey(u8),

    /// A binary frame with no bytes at all.
    #[error("empty binary frame")]
    EmptyFrame,

    /// A binary frame whose body does not match its declared layout size.
    #[error("packet {name} expects {expected} body bytes, got {actual}")]
    BadLength {
        /// Packet type name.
        name: &'static str,
        /// Body size the layout requires.
        expected: usize,
        /// Body size received.
        actual: usize,
    },

    /// Field values do not fit the layout they are encoded against.
    #[error("packet {name}: field {field} has the wrong type")]
    FieldType {
        /// Packet type name.
        name: &'static str,
        /// Offending field name.
        field: &'static str,
    },

    /// Decoded values do not form a packet of the given type.
    #[error("values do not match packet {name}")]
    ValueMismatch {
        /// Packet type name.
        name: &'static str,
    },

    /// A JSON message without a string `_type` discriminator.
    #[error("message has no _type discriminator")]
    MissingDiscriminator,

    /// A JSON message whose `_type` is not a known kind.
    #[error("unknown message kind {0:?}")]
    UnknownKind(String),

    /// Malformed JSON or fields that do not match the message kind.
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
}
