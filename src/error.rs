//! Fatal server errors.
//!
//! Setup errors stop the process before any connection is accepted.
//! Loop errors stop the event loop that hit them. Failures scoped to a
//! single client never show up here; see `runtime::ConnectionOutcome`.

use std::io;
use std::net::SocketAddr;

#[derive(Debug)]
pub enum ServerError {
    /// The port string did not resolve to a local IPv4 address.
    Resolve { port: String, source: Option<io::Error> },
    /// Allocating or configuring the listening socket failed.
    Socket(io::Error),
    /// Binding failed, e.g. the port is already in use.
    Bind { addr: SocketAddr, source: io::Error },
    /// Moving the socket into the listening state failed.
    Listen(io::Error),
    /// Creating the poller or waiting for readiness failed.
    Poll(io::Error),
    /// Registering the listener with a poller failed.
    Register(io::Error),
    /// `accept` failed with something other than "no connection pending".
    Accept(io::Error),
    /// A worker thread could not be started.
    Spawn(io::Error),
    /// A worker thread panicked.
    Panicked { worker: usize },
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::Resolve { port, source: Some(e) } => {
                write!(f, "getaddrinfo() failed for port '{port}': {e}")
            }
            ServerError::Resolve { port, source: None } => {
                write!(f, "getaddrinfo() failed for port '{port}': no IPv4 address")
            }
            ServerError::Socket(e) => write!(f, "socket() failed: {e}"),
            ServerError::Bind { addr, source } => write!(f, "bind() failed on {addr}: {source}"),
            ServerError::Listen(e) => write!(f, "listen() failed: {e}"),
            ServerError::Poll(e) => write!(f, "poll() failed: {e}"),
            ServerError::Register(e) => write!(f, "failed to register listener: {e}"),
            ServerError::Accept(e) => write!(f, "accept() failed: {e}"),
            ServerError::Spawn(e) => write!(f, "failed to spawn worker thread: {e}"),
            ServerError::Panicked { worker } => write!(f, "worker {worker} panicked"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Resolve { source, .. } => {
                source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
            }
            ServerError::Socket(e)
            | ServerError::Listen(e)
            | ServerError::Poll(e)
            | ServerError::Register(e)
            | ServerError::Accept(e)
            | ServerError::Spawn(e) => Some(e),
            ServerError::Bind { source, .. } => Some(source),
            ServerError::Panicked { .. } => None,
        }
    }
}
