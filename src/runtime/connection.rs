//! Single-shot client connections.
//!
//! A client gets exactly one read. If that read carries a request line the
//! fixed header and the resource bytes go back as two writes. Whatever
//! happens, the connection is done afterwards, except when the read would
//! have blocked.

use crate::http::{request_method, RESPONSE_HEADER};
use crate::resource::Resource;
use mio::net::TcpStream;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use tracing::{debug, error, info, warn};

/// What happened when a ready client was serviced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionOutcome {
    /// Readiness was spurious; the client stays watched.
    Pending,
    /// Peer closed or the read failed. Nothing was sent.
    Closed,
    /// No request method could be extracted. Nothing was sent.
    Malformed,
    /// The resource could not be loaded. Nothing was sent.
    Unavailable,
    /// Header and body were written.
    Served { method: String, body_len: usize },
}

impl ConnectionOutcome {
    /// Whether the connection must be dropped from the interest set.
    pub fn is_finished(&self) -> bool {
        !matches!(self, ConnectionOutcome::Pending)
    }
}

/// An accepted peer.
#[derive(Debug)]
pub struct ClientConnection {
    pub stream: TcpStream,
    pub peer: SocketAddr,
}

impl ClientConnection {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self { stream, peer }
    }

    /// Run the one read/respond cycle this connection gets.
    ///
    /// `buf` bounds both the request read and the resource load.
    pub fn serve(&mut self, buf: &mut [u8], resource: &dyn Resource) -> ConnectionOutcome {
        let n = match self.stream.read(buf) {
            Ok(0) => {
                debug!(peer = %self.peer, "Connection closed by client");
                return ConnectionOutcome::Closed;
            }
            Ok(n) => n,
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                return ConnectionOutcome::Pending;
            }
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {
                return ConnectionOutcome::Pending;
            }
            Err(e) => {
                debug!(peer = %self.peer, error = %e, "Read failed");
                return ConnectionOutcome::Closed;
            }
        };

        let request = &buf[..n];
        info!("{}", String::from_utf8_lossy(request));

        let method = match request_method(request) {
            Some(method) => method.to_string(),
            None => {
                warn!(peer = %self.peer, "Failed to get HTTP request method");
                return ConnectionOutcome::Malformed;
            }
        };
        info!(method = %method, "HTTP Request Type: {}", method);

        let body = match resource.load(buf.len()) {
            Ok(body) => body,
            Err(e) => {
                error!(peer = %self.peer, error = %e, "Failed to load resource");
                return ConnectionOutcome::Unavailable;
            }
        };

        self.send(RESPONSE_HEADER, "header");
        self.send(&body, "body");

        ConnectionOutcome::Served {
            method,
            body_len: body.len(),
        }
    }

    /// One write attempt; short writes and errors are logged, not retried.
    fn send(&mut self, data: &[u8], part: &'static str) {
        match self.stream.write(data) {
            Ok(n) if n < data.len() => {
                debug!(peer = %self.peer, part, written = n, total = data.len(), "Short write");
            }
            Ok(_) => {}
            Err(e) => {
                debug!(peer = %self.peer, part, error = %e, "Write failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::net::{Shutdown, TcpListener};
    use std::time::Duration;

    /// Connected (server side, client side) pair over loopback.
    fn pair() -> (ClientConnection, std::net::TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = std::net::TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, peer) = listener.accept().unwrap();
        server.set_nonblocking(true).unwrap();
        client
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        (ClientConnection::new(TcpStream::from_std(server), peer), client)
    }

    /// Retry while the request is still in flight on loopback.
    fn serve_ready(conn: &mut ClientConnection, resource: &dyn Resource) -> ConnectionOutcome {
        let mut buf = [0u8; 4096];
        for _ in 0..500 {
            match conn.serve(&mut buf, resource) {
                ConnectionOutcome::Pending => std::thread::sleep(Duration::from_millis(10)),
                outcome => return outcome,
            }
        }
        ConnectionOutcome::Pending
    }

    #[test]
    fn test_serves_get() {
        let (mut conn, mut client) = pair();
        client.write_all(b"GET / HTTP/1.1\r\n\r\n").unwrap();

        let resource = Bytes::from_static(b"<p>Hello, world!</p>\n");
        let outcome = serve_ready(&mut conn, &resource);
        assert_eq!(
            outcome,
            ConnectionOutcome::Served {
                method: "GET".to_string(),
                body_len: 21
            }
        );
        drop(conn);

        let mut response = Vec::new();
        client.read_to_end(&mut response).unwrap();
        let mut expected = RESPONSE_HEADER.to_vec();
        expected.extend_from_slice(b"<p>Hello, world!</p>\n");
        assert_eq!(response, expected);
    }

    #[test]
    fn test_peer_closed() {
        let (mut conn, client) = pair();
        client.shutdown(Shutdown::Write).unwrap();
        let resource = Bytes::from_static(b"unused");
        assert_eq!(serve_ready(&mut conn, &resource), ConnectionOutcome::Closed);
    }

    #[test]
    fn test_malformed_request_not_served() {
        let (mut conn, mut client) = pair();
        client.write_all(b"\r\n").unwrap();

        let resource = Bytes::from_static(b"unused");
        assert_eq!(serve_ready(&mut conn, &resource), ConnectionOutcome::Malformed);
        drop(conn);

        let mut response = Vec::new();
        let _ = client.read_to_end(&mut response);
        assert!(response.is_empty());
    }

    #[test]
    fn test_missing_resource_not_served() {
        let (mut conn, mut client) = pair();
        client.write_all(b"GET / HTTP/1.1\r\n\r\n").unwrap();

        let resource = crate::resource::StaticFile::new("/nonexistent/exserver/index.html");
        assert_eq!(serve_ready(&mut conn, &resource), ConnectionOutcome::Unavailable);
    }

    #[test]
    fn test_no_data_is_pending() {
        let (mut conn, _client) = pair();
        let mut buf = [0u8; 64];
        let resource = Bytes::from_static(b"unused");
        let outcome = conn.serve(&mut buf, &resource);
        assert_eq!(outcome, ConnectionOutcome::Pending);
        assert!(!outcome.is_finished());
    }
}
