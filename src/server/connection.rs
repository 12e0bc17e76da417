// Connection handling module
// Accepts a single TCP connection and serves it with hyper

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::handlers::{self, App};

/// Accept a connection, enforcing `max_connections`.
///
/// The counter is incremented before the limit check and rolled back on
/// rejection, so concurrent accepts cannot both slip past the limit.
pub fn accept_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    app: &Arc<App>,
    conn_counter: &Arc<AtomicUsize>,
) {
    let prev_count = conn_counter.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = app.state.config.performance.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            conn_counter.fetch_sub(1, Ordering::SeqCst);
            tracing::warn!(
                %peer_addr,
                "max connections reached: {prev_count}/{max_conn}, connection rejected"
            );
            drop(stream);
            return;
        }
    }

    tracing::debug!(%peer_addr, "connection accepted");
    handle_connection(stream, peer_addr, Arc::clone(app), Arc::clone(conn_counter));
}

/// Serve one connection in a local task: HTTP/1 with optional keep-alive,
/// bounded by `max(read_timeout, write_timeout)`.
fn handle_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    app: Arc<App>,
    conn_counter: Arc<AtomicUsize>,
) {
    tokio::task::spawn_local(async move {
        let io = TokioIo::new(stream);

        let perf = &app.state.config.performance;
        let timeout_duration =
            Duration::from_secs(std::cmp::max(perf.read_timeout, perf.write_timeout));

        let mut builder = http1::Builder::new();
        builder.keep_alive(perf.keep_alive_timeout > 0);

        let service_app = Arc::clone(&app);
        let conn = builder.serve_connection(
            io,
            service_fn(move |req| handlers::handle_request(req, Arc::clone(&service_app), peer_addr)),
        );

        match tokio::time::timeout(timeout_duration, conn).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::error!(%peer_addr, error = ?err, "failed to serve connection"),
            Err(_) => tracing::warn!(
                %peer_addr,
                "connection timeout after {} seconds",
                timeout_duration.as_secs()
            ),
        }

        conn_counter.fetch_sub(1, Ordering::SeqCst);
    });
}
