//! Client IP resolution.

use axum::extract::ConnectInfo;
use axum::http::{Extensions, HeaderMap};
use std::net::{IpAddr, SocketAddr};

/// Resolves the client IP for a request.
///
/// When `behind_proxy` is set, the last `X-Forwarded-For` entry wins, then
/// `X-Real-IP`. Otherwise (or when neither header parses) the socket peer address
/// from [`ConnectInfo`] is used. IPv4-mapped IPv6 addresses are returned as IPv4.
///
/// Only the rightmost entry is taken: it is the one appended by the proxy in front
/// of us. Anything to its left came from the client and can be forged.
///
/// Returns `None` when the server was not started with connect info and no trusted
/// header is available.
pub fn resolve_client_ip(
    headers: &HeaderMap,
    extensions: &Extensions,
    behind_proxy: bool,
) -> Option<IpAddr> {
    let forwarded = if behind_proxy {
        forwarded_ip(headers)
    } else {
        None
    };

    forwarded
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
        .map(|ip| ip.to_canonical())
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    // Repeated headers form one list, so the last value holds the last hop.
    let from_xff = headers
        .get_all("x-forwarded-for")
        .iter()
        .last()
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.rsplit(',').next())
        .and_then(|last| last.trim().parse::<IpAddr>().ok());

    from_xff.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    })
}
