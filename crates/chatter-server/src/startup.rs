//! Run the server on a background task.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::server::serve;
use crate::state::AppState;

/// Serve on an already-bound listener from a background Tokio task.
///
/// The server runs until the runtime shuts down or the returned handle is
/// aborted. Errors are logged, not returned.
pub fn spawn_server(listener: TcpListener, state: Arc<AppState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = serve(listener, state, std::future::pending()).await {
            tracing::error!(error = %e, "server exited with error");
        }
    })
}
