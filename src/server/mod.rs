// Server module entry
// Listener setup, the accept loop and per-connection serving

pub mod connection;
pub mod listener;
pub mod signal;

pub use listener::bind_reusable;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::handlers::App;
use connection::accept_connection;

/// Accept connections until SIGINT/SIGTERM
///
/// Must run inside a `LocalSet`; connections are served with `spawn_local`.
pub async fn serve(listener: TcpListener, app: Arc<App>) -> std::io::Result<()> {
    let active_connections = Arc::new(AtomicUsize::new(0));
    let shutdown = signal::shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &app, &active_connections);
                    }
                    Err(e) => tracing::error!(error = %e, "failed to accept connection"),
                }
            }

            () = &mut shutdown => {
                tracing::info!(
                    active = active_connections.load(Ordering::SeqCst),
                    "shutdown signal received, no longer accepting connections"
                );
                return Ok(());
            }
        }
    }
}
