//! Datagram services: UDP binding with address reuse, a limited-broadcast
//! facility and a multicast publisher that caches its destination.

use crate::endpoint::{Endpoint, Family};
use crate::error::{NetworkError, NetworkResult};
use crate::protocol::Protocol;
use crate::resolve;
use ballast::logging;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Binds a fresh datagram endpoint, with `SO_REUSEADDR`, on the first
/// resolver candidate that accepts it. An empty host means any-interface.
pub fn udp_bind(host: &str, port: u16) -> NetworkResult<Endpoint> {
    let candidates = if host.is_empty() {
        vec![SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)]
    } else {
        resolve::lookup(host, port)?
    };

    let mut last = NetworkError::InvalidAddress;

    for addr in candidates {
        let endpoint = match Endpoint::create(Family::of(&addr), Protocol::Udp) {
            Ok(endpoint) => endpoint,
            Err(err) => {
                last = err;
                continue;
            }
        };

        let socket = endpoint.live()?;

        let outcome = socket
            .set_reuse_address(true)
            .and_then(|()| socket.bind(&addr.into()));

        match outcome {
            Ok(()) => return Ok(endpoint),
            Err(err) => last = NetworkError::translate(&err),
        }
    }

    Err(last)
}

/// Limited-broadcast sender/receiver bound to the any-interface.
pub struct Broadcast {
    endpoint: Endpoint,
}

impl Broadcast {
    const BROADCAST_ADDR: &'static str = "255.255.255.255";

    /// Datagram endpoint on `0.0.0.0:port` with broadcast mode enabled.
    pub fn create(port: u16) -> NetworkResult<Broadcast> {
        let endpoint = udp_bind("", port)?;
        endpoint.set_broadcast(true)?;

        Ok(Broadcast { endpoint })
    }

    /// Sends to the limited broadcast address on the given port.
    pub fn send(&self, payload: &[u8], port: u16) -> NetworkResult<usize> {
        self.endpoint.send_to(payload, Self::BROADCAST_ADDR, port)
    }

    /// Plain datagram receive.
    pub fn recv(&self, buf: &mut [u8]) -> NetworkResult<usize> {
        self.endpoint.recv(buf)
    }

    #[inline]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

/// Multicast publisher. The `(group, port)` destination is cached across
/// sends; the endpoint reconnects only when the destination changes, which
/// amortizes resolution for high-rate publishers.
///
/// Group membership (for receiving multicast traffic) is an extension point;
/// creation binds the any-interface only.
#[derive(Debug)]
pub struct Multicast {
    endpoint: Endpoint,
    connected: Option<(String, u16)>,
    log: logging::Logger,
}

impl Multicast {
    /// Datagram endpoint bound to the any-interface on `port`. The group is
    /// only used as the initial send destination cache seed; no membership
    /// is joined.
    pub fn create<'a, L: Into<Option<&'a logging::Logger>>>(
        group: &str,
        port: u16,
        log: L,
    ) -> NetworkResult<Multicast> {
        if group.is_empty() {
            return Err(NetworkError::InvalidInput);
        }

        let endpoint = udp_bind("", port)?;

        Ok(Multicast {
            endpoint,
            connected: None,
            log: logging::child(log),
        })
    }

    /// Sends one datagram to `group:port`, reusing the cached route when the
    /// destination is unchanged since the last send.
    pub fn send(&mut self, payload: &[u8], group: &str, port: u16) -> NetworkResult<usize> {
        self.ensure_connected(group, port)?;

        self.endpoint.send(payload)
    }

    /// Plain datagram receive.
    pub fn recv(&self, buf: &mut [u8]) -> NetworkResult<usize> {
        self.endpoint.recv(buf)
    }

    /// Closes and releases the endpoint.
    pub fn destroy(mut self) -> NetworkResult<()> {
        self.endpoint.close()
    }

    fn ensure_connected(&mut self, group: &str, port: u16) -> NetworkResult<()> {
        if let Some((cached_group, cached_port)) = &self.connected {
            if cached_group == group && *cached_port == port {
                return Ok(());
            }
        }

        self.endpoint.connect(group, port)?;

        logging::debug!(self.log, "multicast destination cached";
                        "group" => group,
                        "port" => port);

        self.connected = Some((group.to_owned(), port));

        Ok(())
    }
}
