//! Client identity extraction from HTTP request parts.
//!
//! Enables the middleware to resolve "who is asking" without caring how the
//! server stack delivers requests: the forwarding header wins when a proxy is
//! in front, otherwise the transport peer address (stamped into request
//! extensions by server wiring) is used.

use http::Request;
use std::net::SocketAddr;

/// Forwarding header consulted for the original client address when the
/// service sits behind a proxy. Only the first comma-separated entry is used.
pub const FORWARDED_FOR_HEADER: &str = "X-Forwarded-For";

/// Request header carrying the caller's API token.
pub const TOKEN_HEADER: &str = "API_KEY";

/// Transport-level peer address of the connection a request arrived on.
///
/// Server wiring inserts this into request extensions; see
/// `turnstile-server` for an axum example.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerAddr(pub SocketAddr);

/// Resolve the client IP for `req`.
///
/// Prefers the first comma-separated entry of [`FORWARDED_FOR_HEADER`]; falls
/// back to the [`PeerAddr`] extension with the port stripped. Resolves to the
/// empty string when neither source is usable.
pub fn client_ip<B>(req: &Request<B>) -> String {
    let forwarded = req
        .headers()
        .get(FORWARDED_FOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    if !forwarded.is_empty() {
        return forwarded.split(',').next().unwrap_or(forwarded).to_string();
    }
    req.extensions()
        .get::<PeerAddr>()
        .map(|peer| peer.0.ip().to_string())
        .unwrap_or_default()
}

/// Read the API token from `req`; empty string when absent or non-UTF-8.
pub fn api_token<B>(req: &Request<B>) -> &str {
    req.headers()
        .get(TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> http::request::Builder {
        Request::builder().uri("/")
    }

    #[test]
    fn forwarded_header_takes_first_entry() {
        let req = request()
            .header(FORWARDED_FOR_HEADER, "203.0.113.5, 10.0.0.1")
            .body(())
            .unwrap();
        assert_eq!(client_ip(&req), "203.0.113.5");
    }

    #[test]
    fn peer_addr_is_used_with_port_stripped() {
        let mut req = request().body(()).unwrap();
        req.extensions_mut().insert(PeerAddr("198.51.100.7:54321".parse().unwrap()));
        assert_eq!(client_ip(&req), "198.51.100.7");
    }

    #[test]
    fn forwarded_header_wins_over_peer_addr() {
        let mut req = request()
            .header(FORWARDED_FOR_HEADER, "203.0.113.5")
            .body(())
            .unwrap();
        req.extensions_mut().insert(PeerAddr("198.51.100.7:54321".parse().unwrap()));
        assert_eq!(client_ip(&req), "203.0.113.5");
    }

    #[test]
    fn empty_forwarded_header_falls_back_to_peer() {
        let mut req = request().header(FORWARDED_FOR_HEADER, "").body(()).unwrap();
        req.extensions_mut().insert(PeerAddr("198.51.100.7:54321".parse().unwrap()));
        assert_eq!(client_ip(&req), "198.51.100.7");
    }

    #[test]
    fn no_identity_resolves_to_empty_string() {
        let req = request().body(()).unwrap();
        assert_eq!(client_ip(&req), "");
    }

    #[test]
    fn token_header_read_verbatim() {
        let req = request().header(TOKEN_HEADER, "abc123").body(()).unwrap();
        assert_eq!(api_token(&req), "abc123");
    }

    #[test]
    fn missing_token_is_empty() {
        let req = request().body(()).unwrap();
        assert_eq!(api_token(&req), "");
    }
}
