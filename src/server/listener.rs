//! Listening socket setup

use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Pending connections the kernel queues before `accept`
const BACKLOG: i32 = 128;

/// Bind `addr` with `SO_REUSEADDR` (and `SO_REUSEPORT` where supported), so
/// a restarted server can take the port back while old sockets linger in
/// `TIME_WAIT`.
pub fn bind_reusable(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
    socket.set_reuse_port(true)?;
    // tokio requires a non-blocking socket
    socket.set_nonblocking(true)?;

    socket.bind(&addr.into())?;
    socket.listen(BACKLOG)?;
    TcpListener::from_std(socket.into())
}
