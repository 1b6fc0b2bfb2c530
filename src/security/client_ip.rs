//! Client address resolution.

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};

pub const REAL_IP_HEADER: &str = "X-Real-IP";
pub const FORWARDED_FOR_HEADER: &str = "X-Forwarded-For";

/// `X-Real-IP`, then the first `X-Forwarded-For` entry, then the peer.
///
/// Forwarding headers are taken at face value; only deploy behind a proxy
/// that overwrites them.
pub fn resolve_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(real_ip) = header(REAL_IP_HEADER) {
        return real_ip.to_string();
    }

    if let Some(first) = header(FORWARDED_FOR_HEADER)
        .and_then(|list| list.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return first.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Resolve using the peer recorded by `into_make_service_with_connect_info`.
pub fn client_ip<B>(request: &Request<B>) -> String {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    resolve_client_ip(request.headers(), peer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> Option<SocketAddr> {
        Some("10.0.0.9:5555".parse().unwrap())
    }

    #[test]
    fn test_precedence() {
        let mut headers = HeaderMap::new();
        assert_eq!(resolve_client_ip(&headers, peer()), "10.0.0.9");
        assert_eq!(resolve_client_ip(&headers, None), "unknown");

        headers.insert(FORWARDED_FOR_HEADER, " 1.1.1.1 , 2.2.2.2".parse().unwrap());
        assert_eq!(resolve_client_ip(&headers, peer()), "1.1.1.1");

        headers.insert(REAL_IP_HEADER, "3.3.3.3".parse().unwrap());
        assert_eq!(resolve_client_ip(&headers, peer()), "3.3.3.3");
    }

    #[test]
    fn test_empty_headers_fall_through() {
        let mut headers = HeaderMap::new();
        headers.insert(REAL_IP_HEADER, "".parse().unwrap());
        headers.insert(FORWARDED_FOR_HEADER, " , 2.2.2.2".parse().unwrap());
        assert_eq!(resolve_client_ip(&headers, peer()), "10.0.0.9");
    }

    #[test]
    fn test_connect_info_extension() {
        let mut request = Request::new(());
        request
            .extensions_mut()
            .insert(ConnectInfo::<SocketAddr>("192.168.1.5:80".parse().unwrap()));
        assert_eq!(client_ip(&request), "192.168.1.5");
    }
}
