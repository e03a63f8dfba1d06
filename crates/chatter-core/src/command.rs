//! The command queue between connection tasks and the universe task.

use chatter_protocol::ClientInput;
use chatter_types::{ConnectionId, SessionId, WorldId};
use tokio::sync::{mpsc, oneshot};

use crate::session::{JoinOutcome, Outbox};

/// A request for the universe task.
#[derive(Debug)]
pub enum Command {
    /// Register a session and join it to a world.
    Connect {
        /// Handshake identifier.
        session: SessionId,
        /// The socket presenting it.
        connection: ConnectionId,
        /// Target world; `None` means the default world.
        world: Option<WorldId>,
        /// Where to send this session's frames.
        outbox: Outbox,
        /// Receives the join outcome.
        reply: oneshot::Sender<JoinOutcome>,
    },
    /// A decoded frame from a joined session.
    Inbound {
        /// Sender.
        session: SessionId,
        /// Sender's socket.
        connection: ConnectionId,
        /// The frame.
        input: ClientInput,
    },
    /// The socket closed.
    Disconnect {
        /// Session that disconnected.
        session: SessionId,
        /// The socket that closed. Ignored unless it still holds the
        /// session.
        connection: ConnectionId,
    },
}

/// The universe task has stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("universe is no longer running")]
pub struct UniverseClosed;

impl From<mpsc::error::SendError<Command>> for UniverseClosed {
    fn from(_: mpsc::error::SendError<Command>) -> Self {
        Self
    }
}

impl From<oneshot::error::RecvError> for UniverseClosed {
    fn from(_: oneshot::error::RecvError) -> Self {
        Self
    }
}

/// Cloneable sender used by connection tasks.
#[derive(Debug, Clone)]
pub struct UniverseHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl UniverseHandle {
    /// A handle and the receiver to pass to
    /// [`run_universe`](crate::runner::run_universe).
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Command>) {
        let (commands, rx) = mpsc::unbounded_channel();
        (Self { commands }, rx)
    }

    /// Ask to join and wait for the outcome.
    pub async fn connect(
        &self,
        session: SessionId,
        connection: ConnectionId,
        world: Option<WorldId>,
        outbox: Outbox,
    ) -> Result<JoinOutcome, UniverseClosed> {
        let (reply, outcome) = oneshot::channel();
        self.commands
            .send(Command::Connect {
                session,
                connection,
                world,
                outbox,
                reply,
            })?;
        Ok(outcome.await?)
    }

    /// Forward a decoded frame.
    pub fn send_input(
        &self,
        session: SessionId,
        connection: ConnectionId,
        input: ClientInput,
    ) -> Result<(), UniverseClosed> {
        self.commands.send(Command::Inbound {
            session,
            connection,
            input,
        })?;
        Ok(())
    }

    /// Report a closed socket. Safe to call after the universe stopped.
    pub fn disconnect(&self, session: SessionId, connection: ConnectionId) {
        let _ = self.commands.send(Command::Disconnect {
            session,
            connection,
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chatter_protocol::BinaryPacket;

    use super::*;

    #[tokio::test]
    async fn stopped_universe_reports_closed() {
        let (handle, commands) = UniverseHandle::channel();
        drop(commands);
        let (outbox, _rx) = Outbox::channel();
        let outcome = handle
            .connect(SessionId::new("ant"), ConnectionId::new(), None, outbox)
            .await;
        assert_eq!(outcome, Err(UniverseClosed));

        let input = ClientInput::Binary(BinaryPacket::MoveToPos { x: 0.0, y: 0.0 });
        assert_eq!(
            handle.send_input(SessionId::new("ant"), ConnectionId::new(), input),
            Err(UniverseClosed)
        );
        handle.disconnect(SessionId::new("ant"), ConnectionId::new());
    }

    #[tokio::test]
    async fn unanswered_connect_reports_closed() {
        let (handle, mut commands) = UniverseHandle::channel();
        let (outbox, _rx) = Outbox::channel();
        let (outcome, ()) = tokio::join!(
            handle.connect(SessionId::new("ant"), ConnectionId::new(), None, outbox),
            async {
                // Dropping the command drops its reply sender.
                let command = commands.recv().await.unwrap();
                assert!(matches!(command, Command::Connect { .. }));
            }
        );
        assert_eq!(outcome, Err(UniverseClosed));
    }
}
