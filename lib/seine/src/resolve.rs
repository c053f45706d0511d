//! System resolver helpers. Lookups go through the platform resolver and
//! allow both IPv4 and IPv6 candidates; callers filter by family as needed.

use crate::error::{NetworkError, NetworkResult};
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};

/// Resolves `host` to candidate socket addresses in resolver order. IP
/// literals short-circuit the resolver.
pub fn lookup(host: &str, port: u16) -> NetworkResult<Vec<SocketAddr>> {
    if host.is_empty() {
        return Err(NetworkError::InvalidInput);
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(vec![SocketAddr::new(ip, port)]);
    }

    let candidates: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|_| NetworkError::InvalidAddress)?
        .collect();

    if candidates.is_empty() {
        return Err(NetworkError::InvalidAddress);
    }

    Ok(candidates)
}

/// Returns the first resolved address, preferring IPv4 when the name maps to
/// both families.
pub fn resolve_host(name: &str) -> NetworkResult<IpAddr> {
    let candidates = lookup(name, 0)?;

    candidates
        .iter()
        .map(|addr| addr.ip())
        .find(IpAddr::is_ipv4)
        .or_else(|| candidates.first().map(|addr| addr.ip()))
        .ok_or(NetworkError::InvalidAddress)
}

/// Returns up to `max` resolved addresses in resolver order.
pub fn resolve_host_all(name: &str, max: usize) -> NetworkResult<Vec<IpAddr>> {
    let mut addrs: Vec<IpAddr> = lookup(name, 0)?.iter().map(|addr| addr.ip()).collect();
    addrs.truncate(max);

    Ok(addrs)
}
