//! The tiny slice of HTTP this server speaks.
//!
//! ```text
//! Request:  GET / HTTP/1.1\r\n...
//! Response: HTTP/1.1 200 OK\r\n
//!           Connection: close\r\n
//!           Content-Type: text/html; charset=UTF-8\r\n
//!           \r\n
//!           <resource bytes>
//! ```
//!
//! Only the method token is looked at. Every request gets the same header
//! block regardless of method or path.

/// Header block sent ahead of the resource bytes.
pub const RESPONSE_HEADER: &[u8] = b"HTTP/1.1 200 OK\r\n\
Connection: close\r\n\
Content-Type: text/html; charset=UTF-8\r\n\
\r\n";

/// Extract the request method: the first whitespace-delimited token.
///
/// Returns `None` for empty or whitespace-only input, and for a first
/// token that is not valid UTF-8.
pub fn request_method(request: &[u8]) -> Option<&str> {
    let token = request
        .split(|b| b.is_ascii_whitespace())
        .find(|token| !token.is_empty())?;

    std::str::from_utf8(token).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_header_bytes() {
        assert_eq!(
            RESPONSE_HEADER,
            &b"HTTP/1.1 200 OK\r\nConnection: close\r\nContent-Type: text/html; charset=UTF-8\r\n\r\n"[..]
        );
    }

    #[test]
    fn test_method_from_request_line() {
        assert_eq!(request_method(b"GET / HTTP/1.1\r\n\r\n"), Some("GET"));
        assert_eq!(request_method(b"POST /form HTTP/1.1\r\n"), Some("POST"));
    }

    #[test]
    fn test_method_without_spaces() {
        assert_eq!(request_method(b"PING\r\n"), Some("PING"));
        assert_eq!(request_method(b"garbage"), Some("garbage"));
    }

    #[test]
    fn test_leading_whitespace_skipped() {
        assert_eq!(request_method(b"  \tHEAD / HTTP/1.0"), Some("HEAD"));
    }

    #[test]
    fn test_no_token() {
        assert_eq!(request_method(b""), None);
        assert_eq!(request_method(b"\r\n"), None);
        assert_eq!(request_method(b" \t \r\n "), None);
    }

    #[test]
    fn test_non_utf8_token() {
        assert_eq!(request_method(b"\xff\xfe / HTTP/1.1"), None);
    }
}
