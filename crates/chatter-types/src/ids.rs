//! Type-safe identifier wrappers.
//!
//! Entities, sessions and worlds are keyed by strings on the wire: entity
//! ids are random UUID v4 strings, session ids are the identifier a client
//! sends in its handshake, and world ids come from configuration. Wrapping
//! each one in its own newtype stops a session key from being used where an
//! entity key is expected.
//!
//! [`ConnectionId`] is server-internal and distinguishes two sockets that
//! present the same session identifier.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`String`] with standard derives.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing string as an identifier.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Return the inner [`String`] value.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id! {
    /// Unique identifier for an entity within a world.
    EntityId
}

define_string_id! {
    /// Identifier a client presents in its handshake.
    ///
    /// Unique across the whole universe for as long as the connection
    /// that claimed it stays open.
    SessionId
}

define_string_id! {
    /// Unique identifier for a world within the universe.
    WorldId
}

impl EntityId {
    /// Create a fresh random identifier (UUID v4, hyphenated).
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Server-side identity of a single accepted socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}
