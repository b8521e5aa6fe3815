//! Listening socket setup.
//!
//! Every step (resolve, socket, bind, listen) has its own error variant so
//! the caller can report exactly which one failed.

use crate::error::ServerError;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use tracing::info;

/// Pending connection queue length.
pub const BACKLOG: i32 = 10;

/// Resolve the wildcard IPv4 address for `port`.
///
/// Only numeric ports are accepted. Service names such as `"http"` are
/// rejected with `ServerError::Resolve` rather than looked up.
pub fn resolve(port: &str) -> Result<SocketAddr, ServerError> {
    let mut addrs = ("0.0.0.0", port.parse::<u16>().map_err(|_| resolve_error(port, None))?)
        .to_socket_addrs()
        .map_err(|e| resolve_error(port, Some(e)))?;

    addrs
        .find(SocketAddr::is_ipv4)
        .ok_or_else(|| resolve_error(port, None))
}

fn resolve_error(port: &str, source: Option<std::io::Error>) -> ServerError {
    ServerError::Resolve {
        port: port.to_string(),
        source,
    }
}

/// Create a non-blocking TCP listener bound to `port` on all IPv4 interfaces.
pub fn bind(port: &str) -> Result<TcpListener, ServerError> {
    let addr = resolve(port)?;

    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
        .map_err(ServerError::Socket)?;

    socket.set_reuse_address(true).map_err(ServerError::Socket)?;
    socket.set_nonblocking(true).map_err(ServerError::Socket)?;

    socket
        .bind(&addr.into())
        .map_err(|source| ServerError::Bind { addr, source })?;

    socket.listen(BACKLOG).map_err(ServerError::Listen)?;

    let listener: TcpListener = socket.into();
    let local = listener.local_addr().map_err(ServerError::Socket)?;
    info!(port = local.port(), "Listening on port {}...", local.port());

    Ok(listener)
}
