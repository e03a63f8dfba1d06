//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure that can stop startup.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: chatter_core::ConfigError,
    },

    /// Building the universe from configuration failed.
    #[error("universe error: {source}")]
    Universe {
        /// The underlying universe error.
        #[from]
        source: chatter_core::UniverseError,
    },

    /// The binary packet registry is inconsistent.
    #[error("protocol error: {source}")]
    Protocol {
        /// The underlying protocol error.
        #[from]
        source: chatter_protocol::ProtocolError,
    },

    /// The WebSocket server failed to bind or serve.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: chatter_server::ServerError,
    },
}
