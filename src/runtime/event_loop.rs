//! mio event loop implementation.
//!
//! Readiness-based model: poll tells us which descriptors are readable,
//! then each one is handled to completion before the next poll.
//! Uses epoll on Linux, kqueue on macOS.
//!
//! ## Level-triggered passes
//!
//! mio reports edges, but each pass accepts at most one connection. After a
//! successful accept the listener stays marked ready and the next pass polls
//! without blocking, so queued connections are not stranded until the next
//! edge. The mark is cleared once `accept` reports `WouldBlock`.

use crate::error::ServerError;
use crate::resource::Resource;
use crate::runtime::{ClientConnection, ConnectionOutcome, InterestSet, BUFFER_SIZE};
use mio::net::TcpStream;
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};
use std::collections::BTreeSet;
use std::io;
use std::net::TcpListener;
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

const EVENTS_CAPACITY: usize = 1024;

/// One readiness loop: a poller, its interest set, and a receive buffer.
pub struct Worker {
    id: usize,
    poll: Poll,
    events: Events,
    listener: Arc<TcpListener>,
    interest: InterestSet<ClientConnection>,
    listener_pending: bool,
    resource: Arc<dyn Resource>,
    buf: Vec<u8>,
}

/// Tally of a single pass, mostly for tests and trace logging.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassReport {
    /// Descriptors handled, in the order they were handled.
    pub handled: Vec<RawFd>,
    /// Connections accepted this pass.
    pub accepted: usize,
    /// Client outcomes this pass, in handling order.
    pub outcomes: Vec<ConnectionOutcome>,
}

impl Worker {
    /// Register the shared listener with a fresh poller.
    pub fn new(
        id: usize,
        listener: Arc<TcpListener>,
        resource: Arc<dyn Resource>,
    ) -> Result<Self, ServerError> {
        let poll = Poll::new().map_err(ServerError::Poll)?;
        let fd = listener.as_raw_fd();

        poll.registry()
            .register(&mut SourceFd(&fd), token(fd), Interest::READABLE)
            .map_err(ServerError::Register)?;

        Ok(Self {
            id,
            poll,
            events: Events::with_capacity(EVENTS_CAPACITY),
            listener,
            interest: InterestSet::new(fd),
            listener_pending: false,
            resource,
            buf: vec![0u8; BUFFER_SIZE],
        })
    }

    #[cfg(test)]
    pub fn interest(&self) -> &InterestSet<ClientConnection> {
        &self.interest
    }

    /// Run passes until a fatal error.
    pub fn run(&mut self) -> Result<(), ServerError> {
        info!(worker = self.id, "Waiting for client connections...");
        loop {
            self.turn(None)?;
        }
    }

    /// Wait for readiness (at most `timeout`, `None` = forever) and handle
    /// every ready descriptor once, in ascending order.
    pub fn turn(&mut self, timeout: Option<Duration>) -> Result<PassReport, ServerError> {
        let timeout = if self.listener_pending {
            Some(Duration::ZERO)
        } else {
            timeout
        };

        match self.poll.poll(&mut self.events, timeout) {
            Ok(()) => {}
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {
                return Ok(PassReport::default());
            }
            Err(e) => return Err(ServerError::Poll(e)),
        }

        let mut ready: BTreeSet<RawFd> = self
            .events
            .iter()
            .filter(|event| event.is_readable() || event.is_read_closed() || event.is_error())
            .map(|event| event.token().0 as RawFd)
            .collect();
        if self.listener_pending {
            ready.insert(self.interest.listener());
        }

        let mut report = PassReport::default();
        for fd in self.interest.descriptors() {
            if !ready.contains(&fd) || !self.interest.contains(fd) {
                continue;
            }
            report.handled.push(fd);

            if self.interest.is_listener(fd) {
                if self.accept_one()? {
                    report.accepted += 1;
                }
            } else if let Some(outcome) = self.service_client(fd) {
                report.outcomes.push(outcome);
            }
        }

        trace!(
            worker = self.id,
            handled = report.handled.len(),
            accepted = report.accepted,
            finished = report.outcomes.iter().filter(|o| o.is_finished()).count(),
            "Pass complete"
        );
        Ok(report)
    }

    /// Accept at most one connection. Returns whether one was added.
    fn accept_one(&mut self) -> Result<bool, ServerError> {
        let (stream, peer) = match self.listener.accept() {
            Ok(accepted) => accepted,
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                self.listener_pending = false;
                return Ok(false);
            }
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {
                self.listener_pending = true;
                return Ok(false);
            }
            Err(e) => return Err(ServerError::Accept(e)),
        };
        self.listener_pending = true;

        // Accepted sockets do not inherit O_NONBLOCK on every platform.
        if let Err(e) = stream.set_nonblocking(true) {
            warn!(peer = %peer, error = %e, "Failed to configure connection, dropping");
            return Ok(false);
        }

        let mut stream = TcpStream::from_std(stream);
        let fd = stream.as_raw_fd();

        if let Err(e) = self
            .poll
            .registry()
            .register(&mut stream, token(fd), Interest::READABLE)
        {
            warn!(peer = %peer, error = %e, "Failed to register connection, dropping");
            return Ok(false);
        }

        if let Err(mut rejected) = self.interest.insert(fd, ClientConnection::new(stream, peer)) {
            warn!(fd, "Descriptor already watched, dropping");
            if let Err(e) = self.poll.registry().deregister(&mut rejected.stream) {
                debug!(fd, error = %e, "Deregister failed");
            }
            return Ok(false);
        }

        info!(worker = self.id, fd, peer = %peer.ip(), "New connection from {}.", peer.ip());
        debug!(
            worker = self.id,
            watched = self.interest.len(),
            max_fd = self.interest.max_descriptor(),
            "Interest set grew"
        );
        Ok(true)
    }

    /// Service a ready client; closes it unless the read would have blocked.
    fn service_client(&mut self, fd: RawFd) -> Option<ConnectionOutcome> {
        let conn = self.interest.get_mut(fd)?;
        let outcome = conn.serve(&mut self.buf, self.resource.as_ref());

        if let ConnectionOutcome::Served { method, body_len } = &outcome {
            debug!(worker = self.id, fd, method = %method, body_len, "Response sent");
        }
        if outcome.is_finished() {
            self.close(fd);
        }
        Some(outcome)
    }

    fn close(&mut self, fd: RawFd) {
        if let Some(mut conn) = self.interest.remove(fd) {
            if let Err(e) = self.poll.registry().deregister(&mut conn.stream) {
                debug!(worker = self.id, fd, error = %e, "Deregister failed");
            }
            debug!(
                worker = self.id,
                fd,
                peer = %conn.peer,
                open = self.interest.clients(),
                "Connection closed"
            );
        }
    }
}

fn token(fd: RawFd) -> Token {
    Token(fd as usize)
}
