//! One task per socket.
//!
//! A session goes through three phases:
//!
//! 1. **Handshake** -- the first text frame (or UTF-8 binary frame) is the
//!    session identifier, trimmed.
//! 2. **Join** -- the universe task decides whether the identifier and
//!    world are acceptable. A rejection closes the socket with a reason.
//! 3. **Pump** -- frames from the universe go out and frames from the
//!    client go in until either side stops.
//!
//! Once joined, a [`Membership`] guard owns the directory entry. Whatever
//! ends the pump (client close, malformed frame, task abort) drops the
//! guard, and the guard tells the universe the session is gone.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use chatter_core::session::REASON_INVALID_IDENTIFIER;
use chatter_core::{Outbound, Outbox, UniverseClosed, UniverseHandle};
use chatter_protocol::{ClientInput, ClientMessage, PacketRegistry, ProtocolError};
use chatter_types::{ConnectionId, SessionId, WorldId};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Close reason when the universe task is gone.
pub const REASON_SHUTTING_DOWN: &str = "Server shutting down";

/// Query parameters accepted on `/connect`.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    /// World to join; the default world when absent.
    pub world: Option<String>,
}

/// Upgrade to a `WebSocket` and run a session on it.
///
/// # Route
///
/// `GET /connect?world=<id>`
pub async fn connect(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let world = params.world.map(WorldId::new);
    ws.on_upgrade(move |socket| run_session(socket, state, world))
}

// ---- Handshake ----

/// Result of reading the handshake frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handshake {
    /// A usable identifier.
    Identified {
        /// The session key.
        session: SessionId,
        /// The identifier arrived as a binary frame.
        legacy: bool,
    },
    /// The frame was blank or not UTF-8.
    Invalid,
    /// The socket closed first.
    Closed,
}

/// Trim `text` into a session identifier. Blank text is rejected.
pub fn parse_identifier(text: &str) -> Option<SessionId> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| SessionId::new(trimmed))
}

/// Interpret one frame as the handshake. Ping and pong are skipped.
pub fn handshake_frame(message: &Message) -> Option<Handshake> {
    let identified = |session, legacy| Handshake::Identified { session, legacy };
    match message {
        Message::Text(text) => Some(
            parse_identifier(text.as_str()).map_or(Handshake::Invalid, |s| identified(s, false)),
        ),
        Message::Binary(bytes) => Some(
            std::str::from_utf8(bytes)
                .ok()
                .and_then(parse_identifier)
                .map_or(Handshake::Invalid, |s| identified(s, true)),
        ),
        Message::Close(_) => Some(Handshake::Closed),
        Message::Ping(_) | Message::Pong(_) => None,
    }
}

async fn read_handshake(socket: &mut WebSocket) -> Handshake {
    while let Some(Ok(message)) = socket.recv().await {
        if let Some(handshake) = handshake_frame(&message) {
            return handshake;
        }
    }
    Handshake::Closed
}

// ---- Inbound frames ----

/// What an inbound frame means for the pump.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Forward to the universe.
    Input(ClientInput),
    /// Ping or pong.
    Control,
    /// The client closed.
    Closed,
}

/// Decode a client frame. Text frames are JSON envelopes, binary frames
/// are registry packets.
pub fn decode_frame(registry: &PacketRegistry, message: &Message) -> Result<Inbound, ProtocolError> {
    match message {
        Message::Text(text) => {
            ClientMessage::decode(text.as_str()).map(|m| Inbound::Input(ClientInput::Json(m)))
        }
        Message::Binary(bytes) => registry
            .decode(bytes)
            .map(|p| Inbound::Input(ClientInput::Binary(p))),
        Message::Ping(_) | Message::Pong(_) => Ok(Inbound::Control),
        Message::Close(_) => Ok(Inbound::Closed),
    }
}

// ---- Membership ----

/// Directory membership held by a joined connection task.
///
/// Dropping it reports the disconnect.
#[derive(Debug)]
pub struct Membership {
    universe: UniverseHandle,
    session: SessionId,
    connection: ConnectionId,
}

impl Membership {
    /// Take ownership of a joined session.
    pub const fn new(universe: UniverseHandle, session: SessionId, connection: ConnectionId) -> Self {
        Self {
            universe,
            session,
            connection,
        }
    }

    /// The session held.
    pub const fn session(&self) -> &SessionId {
        &self.session
    }

    /// Send a decoded frame to the universe on this session's behalf.
    pub fn forward(&self, input: ClientInput) -> Result<(), UniverseClosed> {
        self.universe
            .send_input(self.session.clone(), self.connection, input)
    }
}

impl Drop for Membership {
    fn drop(&mut self) {
        debug!(session = %self.session, "releasing membership");
        self.universe.disconnect(self.session.clone(), self.connection);
    }
}

// ---- Session task ----

/// Why a joined session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    ClientClosed,
    Malformed,
    SendFailed,
    Released,
    UniverseClosed,
}

impl SessionEnd {
    const fn as_str(self) -> &'static str {
        match self {
            Self::ClientClosed => "client closed",
            Self::Malformed => "malformed frame",
            Self::SendFailed => "send failed",
            Self::Released => "released by universe",
            Self::UniverseClosed => "universe stopped",
        }
    }
}

fn close_message(reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame {
        code: close_code::POLICY,
        reason: reason.into(),
    }))
}

async fn close_with(mut socket: WebSocket, reason: &'static str) {
    if socket.send(close_message(reason)).await.is_err() {
        debug!("socket gone before close frame");
    }
}

async fn run_session(mut socket: WebSocket, state: Arc<AppState>, world: Option<WorldId>) {
    let (session, legacy) = match read_handshake(&mut socket).await {
        Handshake::Identified { session, legacy } => (session, legacy),
        Handshake::Invalid => {
            debug!("rejecting blank or non-UTF-8 identifier");
            close_with(socket, REASON_INVALID_IDENTIFIER).await;
            return;
        }
        Handshake::Closed => {
            debug!("socket closed before handshake");
            return;
        }
    };

    let connection = ConnectionId::new();
    let (outbox, mut outbound) = Outbox::channel();
    let outcome = match state
        .universe
        .connect(session.clone(), connection, world, outbox)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(session = %session, error = %e, "join failed");
            close_with(socket, REASON_SHUTTING_DOWN).await;
            return;
        }
    };
    if let Some(reason) = outcome.close_reason() {
        info!(session = %session, reason, "session rejected");
        close_with(socket, reason).await;
        return;
    }

    let membership = Membership::new(state.universe.clone(), session, connection);
    debug!(session = %membership.session(), legacy, "session pump started");
    let end = pump(&mut socket, &state.registry, &membership, &mut outbound, legacy).await;
    info!(session = %membership.session(), reason = end.as_str(), "session ended");
}

async fn pump(
    socket: &mut WebSocket,
    registry: &PacketRegistry,
    membership: &Membership,
    outbound: &mut mpsc::Receiver<Outbound>,
    mut legacy: bool,
) -> SessionEnd {
    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    return SessionEnd::Released;
                };
                if let Some(end) = write_frame(socket, registry, frame, legacy).await {
                    return end;
                }
            }
            incoming = socket.recv() => {
                let Some(Ok(message)) = incoming else {
                    return SessionEnd::ClientClosed;
                };
                match decode_frame(registry, &message) {
                    Ok(Inbound::Input(input)) => {
                        if !legacy && matches!(input, ClientInput::Binary(_)) {
                            legacy = true;
                            debug!(session = %membership.session(), "session switched to legacy framing");
                        }
                        if membership.forward(input).is_err() {
                            return SessionEnd::UniverseClosed;
                        }
                    }
                    Ok(Inbound::Control) => {}
                    Ok(Inbound::Closed) => return SessionEnd::ClientClosed,
                    Err(e) => {
                        debug!(session = %membership.session(), error = %e, "malformed frame");
                        return SessionEnd::Malformed;
                    }
                }
            }
        }
    }
}

async fn write_frame(
    socket: &mut WebSocket,
    registry: &PacketRegistry,
    frame: Outbound,
    legacy: bool,
) -> Option<SessionEnd> {
    let message = match frame {
        Outbound::Message(message) => match message.encode() {
            Ok(text) => Message::Text(text.into()),
            Err(e) => {
                warn!(kind = message.kind(), error = %e, "failed to encode message");
                return None;
            }
        },
        Outbound::Legacy(_) if !legacy => return None,
        Outbound::Legacy(packet) => match registry.encode(&packet) {
            Ok(bytes) => Message::Binary(bytes.into()),
            Err(e) => {
                warn!(error = %e, "failed to encode legacy packet");
                return None;
            }
        },
    };

    if let Err(e) = socket.send(message).await {
        debug!(error = %e, "send failed");
        return Some(SessionEnd::SendFailed);
    }
    None
}
