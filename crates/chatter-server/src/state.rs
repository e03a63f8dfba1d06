//! Shared application state for the WebSocket server.

use chatter_core::UniverseHandle;
use chatter_protocol::PacketRegistry;

/// State shared by every connection task.
#[derive(Debug)]
pub struct AppState {
    /// Command queue into the universe task.
    pub universe: UniverseHandle,
    /// Binary packet layouts for legacy frames.
    pub registry: PacketRegistry,
}

impl AppState {
    /// Bundle a universe handle with the packet registry.
    pub const fn new(universe: UniverseHandle, registry: PacketRegistry) -> Self {
        Self { universe, registry }
    }
}
