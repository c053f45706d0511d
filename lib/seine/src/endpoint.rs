//! The transport primitive: one owned descriptor plus the metadata needed to
//! normalize protocol selection and error translation across platforms.

use crate::error::{NetworkError, NetworkResult};
use crate::poller::{self, Readiness};
use crate::protocol::Protocol;
use crate::resolve;
use crate::sys;
use socket2::{Domain, Socket, Type};
use std::io;
use std::io::Read;
use std::mem::MaybeUninit;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr};
use std::time::Duration;

/// Address family of an endpoint. Dual-stack deployments are expected; a
/// single endpoint is always exactly one family.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Family {
    Ipv4,
    Ipv6,
}

impl Family {
    /// Family of a concrete socket address.
    #[inline]
    pub fn of(addr: &SocketAddr) -> Family {
        match addr {
            SocketAddr::V4(_) => Family::Ipv4,
            SocketAddr::V6(_) => Family::Ipv6,
        }
    }

    #[inline]
    fn domain(self) -> Domain {
        match self {
            Family::Ipv4 => Domain::IPV4,
            Family::Ipv6 => Domain::IPV6,
        }
    }

    #[inline]
    fn matches(self, addr: &SocketAddr) -> bool {
        Family::of(addr) == self
    }

    #[inline]
    fn unspecified(self) -> IpAddr {
        match self {
            Family::Ipv4 => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            Family::Ipv6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        }
    }
}

/// OS-level socket type the protocol tag resolved to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum SocketKind {
    Stream,
    Datagram,
    Raw,
}

impl SocketKind {
    #[inline]
    fn os_type(self) -> Type {
        match self {
            SocketKind::Stream => Type::STREAM,
            SocketKind::Datagram => Type::DGRAM,
            SocketKind::Raw => Type::RAW,
        }
    }
}

/// Process-wide socket runtime initialization. A no-op on POSIX; on Windows
/// the socket runtime is started by the first socket creation, so a probe
/// socket warms it up eagerly.
pub fn init() -> NetworkResult<()> {
    #[cfg(windows)]
    {
        let probe = Socket::new(Domain::IPV4, Type::DGRAM, None).map_err(NetworkError::from)?;
        drop(probe);
    }

    Ok(())
}

/// Counterpart of [`init`]. A no-op everywhere; the runtime is torn down with
/// the process.
pub fn cleanup() {}

/// One communication endpoint. Live endpoints hold a descriptor; `close`
/// replaces it with the sentinel (empty) state exactly once, after which
/// every operation fails with `Closed`.
#[derive(Debug)]
pub struct Endpoint {
    socket: Option<Socket>,
    family: Family,
    kind: SocketKind,
    proto: Protocol,
    nonblocking: bool,
    send_timeout: Option<Duration>,
    recv_timeout: Option<Duration>,
}

impl Endpoint {
    /// Allocates a descriptor for the `(family, protocol)` pair. Stream tags
    /// above `Sctp` fall back to plain TCP.
    pub fn create(family: Family, proto: Protocol) -> NetworkResult<Endpoint> {
        let (kind, os_proto) = match proto {
            Protocol::Udp => (SocketKind::Datagram, socket2::Protocol::UDP),
            Protocol::Raw => (SocketKind::Raw, socket2::Protocol::from(sys::IPPROTO_RAW)),
            Protocol::Icmp => {
                let icmp = match family {
                    Family::Ipv4 => socket2::Protocol::ICMPV4,
                    Family::Ipv6 => socket2::Protocol::ICMPV6,
                };
                (SocketKind::Raw, icmp)
            }
            Protocol::Sctp => match sys::IPPROTO_SCTP {
                Some(code) => (SocketKind::Stream, socket2::Protocol::from(code)),
                None => return Err(NetworkError::Unsupported),
            },
            _ => (SocketKind::Stream, socket2::Protocol::TCP),
        };

        let socket = Socket::new(family.domain(), kind.os_type(), Some(os_proto))
            .map_err(NetworkError::from)?;

        Ok(Endpoint {
            socket: Some(socket),
            family,
            kind,
            proto,
            nonblocking: false,
            send_timeout: None,
            recv_timeout: None,
        })
    }

    /// Composes tag lookup, creation and connection. The endpoint family
    /// follows the resolved address. A partially constructed endpoint is
    /// closed before the error is returned.
    pub fn open(proto_name: &str, host: &str, port: u16) -> NetworkResult<Endpoint> {
        let proto = Protocol::from_name(proto_name);
        if proto == Protocol::Unknown {
            return Err(NetworkError::Unsupported);
        }

        let family = match resolve::resolve_host(host)? {
            IpAddr::V4(_) => Family::Ipv4,
            IpAddr::V6(_) => Family::Ipv6,
        };

        let mut endpoint = Endpoint::create(family, proto)?;

        if let Err(err) = endpoint.connect(host, port) {
            endpoint.close()?;
            return Err(err);
        }

        Ok(endpoint)
    }

    /// Binds, with `SO_REUSEADDR`, a fresh stream listener on the first
    /// resolver candidate that accepts it. An empty host means any-interface.
    pub fn listen_on(host: &str, port: u16, backlog: i32) -> NetworkResult<Endpoint> {
        let candidates = if host.is_empty() {
            vec![SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)]
        } else {
            resolve::lookup(host, port)?
        };

        let mut last = NetworkError::InvalidAddress;

        for addr in candidates {
            let endpoint = match Endpoint::create(Family::of(&addr), Protocol::Tcp) {
                Ok(endpoint) => endpoint,
                Err(err) => {
                    last = err;
                    continue;
                }
            };

            let socket = endpoint.live()?;

            let outcome = socket
                .set_reuse_address(true)
                .and_then(|()| socket.bind(&addr.into()))
                .and_then(|()| socket.listen(backlog));

            match outcome {
                Ok(()) => return Ok(endpoint),
                // Failed candidate endpoints are dropped, releasing the
                // descriptor before the next attempt.
                Err(err) => last = NetworkError::translate(&err),
            }
        }

        Err(last)
    }

    /// Associates the endpoint with a local address. An empty host binds the
    /// any-interface address of the endpoint's family.
    pub fn bind(&self, host: &str, port: u16) -> NetworkResult<()> {
        let socket = self.live()?;

        let addr = if host.is_empty() {
            SocketAddr::new(self.family.unspecified(), port)
        } else {
            let candidates = resolve::lookup(host, port)?;
            candidates
                .into_iter()
                .find(|addr| self.family.matches(addr))
                .ok_or(NetworkError::InvalidAddress)?
        };

        socket.bind(&addr.into()).map_err(NetworkError::from)
    }

    /// Transitions a bound stream endpoint into accepting state.
    pub fn listen(&self, backlog: i32) -> NetworkResult<()> {
        self.live()?.listen(backlog).map_err(NetworkError::from)
    }

    /// Waits for a peer (or fails `WouldBlock` in nonblocking mode). The new
    /// endpoint inherits family, kind and protocol from the listener.
    pub fn accept(&self) -> NetworkResult<Endpoint> {
        let (stream, _peer) = self.live()?.accept().map_err(|err| self.fold_recv_error(err))?;

        Ok(Endpoint {
            socket: Some(stream),
            family: self.family,
            kind: self.kind,
            proto: self.proto,
            nonblocking: false,
            send_timeout: None,
            recv_timeout: None,
        })
    }

    /// Connects to the first resolver candidate of the endpoint's family
    /// that answers; candidates are attempted in resolver order.
    pub fn connect(&self, host: &str, port: u16) -> NetworkResult<()> {
        let socket = self.live()?;
        let candidates = resolve::lookup(host, port)?;

        let mut last = NetworkError::InvalidAddress;

        for addr in candidates.iter().filter(|addr| self.family.matches(addr)) {
            match socket.connect(&(*addr).into()) {
                Ok(()) => return Ok(()),
                Err(err) => last = NetworkError::translate(&err),
            }
        }

        Err(last)
    }

    /// Single-syscall send; may deliver a short count.
    pub fn send(&self, payload: &[u8]) -> NetworkResult<usize> {
        self.live()?
            .send(payload)
            .map_err(|err| self.fold_send_error(err))
    }

    /// Single-syscall receive; may deliver a short count. Zero means the
    /// peer performed an orderly shutdown.
    pub fn recv(&self, buf: &mut [u8]) -> NetworkResult<usize> {
        let mut socket = self.live()?;

        socket.read(buf).map_err(|err| self.fold_recv_error(err))
    }

    /// Datagram send with per-message addressing.
    pub fn send_to(&self, payload: &[u8], host: &str, port: u16) -> NetworkResult<usize> {
        let socket = self.live()?;

        let addr = resolve::lookup(host, port)?
            .into_iter()
            .find(|addr| self.family.matches(addr))
            .ok_or(NetworkError::InvalidAddress)?;

        socket
            .send_to(payload, &addr.into())
            .map_err(|err| self.fold_send_error(err))
    }

    /// Datagram receive returning the byte count and the peer address.
    pub fn recv_from(&self, buf: &mut [u8]) -> NetworkResult<(usize, SocketAddr)> {
        let socket = self.live()?;

        // recv only ever writes into the slice; reinterpreting the
        // initialized buffer as MaybeUninit is sound.
        let uninit = unsafe { &mut *(buf as *mut [u8] as *mut [MaybeUninit<u8>]) };

        let (count, peer) = socket
            .recv_from(uninit)
            .map_err(|err| self.fold_recv_error(err))?;

        let peer = peer.as_socket().ok_or(NetworkError::Unknown)?;

        Ok((count, peer))
    }

    /// Releases the descriptor. Idempotent; a second close is a no-op.
    pub fn close(&mut self) -> NetworkResult<()> {
        drop(self.socket.take());
        Ok(())
    }

    /// Disables reads, writes or both without releasing the descriptor.
    pub fn shutdown(&self, how: Shutdown) -> NetworkResult<()> {
        self.live()?.shutdown(how).map_err(NetworkError::from)
    }

    /// Raw option passthrough. Level and option integers reach the OS
    /// unchanged; the library does not filter.
    pub fn set_option(&self, level: i32, option: i32, value: i32) -> NetworkResult<()> {
        let descriptor = self.descriptor()?;

        sys::set_option(descriptor, level, option, value).map_err(NetworkError::from)
    }

    /// Raw option read, the counterpart of [`Endpoint::set_option`].
    pub fn get_option(&self, level: i32, option: i32) -> NetworkResult<i32> {
        let descriptor = self.descriptor()?;

        sys::get_option(descriptor, level, option).map_err(NetworkError::from)
    }

    /// Toggles nonblocking mode. In nonblocking mode suspending operations
    /// fail immediately with `WouldBlock`.
    pub fn set_nonblocking(&mut self, nonblocking: bool) -> NetworkResult<()> {
        self.live()?
            .set_nonblocking(nonblocking)
            .map_err(NetworkError::from)?;

        self.nonblocking = nonblocking;

        Ok(())
    }

    /// Bounds blocking sends and receives. `None` (or a zero duration)
    /// disables the respective bound; operations exceeding a bound fail
    /// with `TimedOut`.
    pub fn set_timeout(
        &mut self,
        send: Option<Duration>,
        recv: Option<Duration>,
    ) -> NetworkResult<()> {
        let send = send.filter(|bound| !bound.is_zero());
        let recv = recv.filter(|bound| !bound.is_zero());

        {
            let socket = self.live()?;
            socket.set_write_timeout(send).map_err(NetworkError::from)?;
            socket.set_read_timeout(recv).map_err(NetworkError::from)?;
        }

        self.send_timeout = send;
        self.recv_timeout = recv;

        Ok(())
    }

    /// Enables or disables datagram broadcast. Rejected on stream and raw
    /// endpoints.
    pub fn set_broadcast(&self, enabled: bool) -> NetworkResult<()> {
        if self.kind != SocketKind::Datagram {
            return Err(NetworkError::InvalidInput);
        }

        self.live()?
            .set_broadcast(enabled)
            .map_err(NetworkError::from)
    }

    /// Local side of the endpoint.
    pub fn local_addr(&self) -> NetworkResult<SocketAddr> {
        let addr = self.live()?.local_addr().map_err(NetworkError::from)?;

        addr.as_socket().ok_or(NetworkError::Unknown)
    }

    /// Remote side of the endpoint.
    pub fn peer_addr(&self) -> NetworkResult<SocketAddr> {
        let addr = self.live()?.peer_addr().map_err(NetworkError::from)?;

        addr.as_socket().ok_or(NetworkError::Unknown)
    }

    /// Bounded single-endpoint readiness wait; one-element multiplexer
    /// semantics. An empty result mask means the bound elapsed.
    pub fn wait(&self, interest: Readiness, timeout: Option<Duration>) -> NetworkResult<Readiness> {
        poller::poll_single(self.descriptor()?, interest, timeout)
    }

    #[inline]
    pub fn family(&self) -> Family {
        self.family
    }

    #[inline]
    pub fn kind(&self) -> SocketKind {
        self.kind
    }

    #[inline]
    pub fn protocol(&self) -> Protocol {
        self.proto
    }

    #[inline]
    pub fn is_ipv6(&self) -> bool {
        self.family == Family::Ipv6
    }

    /// True once the descriptor has been released.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.socket.is_none()
    }

    #[inline]
    pub(crate) fn live(&self) -> NetworkResult<&Socket> {
        self.socket.as_ref().ok_or(NetworkError::Closed)
    }

    #[inline]
    pub(crate) fn descriptor(&self) -> NetworkResult<sys::RawDescriptor> {
        Ok(sys::descriptor(self.live()?))
    }

    /// The OS reports an expired `SO_RCVTIMEO` as a would-block; fold it
    /// back into the deadline taxonomy when a receive bound is armed.
    fn fold_recv_error(&self, err: io::Error) -> NetworkError {
        self.fold_timeout(err, self.recv_timeout)
    }

    fn fold_send_error(&self, err: io::Error) -> NetworkError {
        self.fold_timeout(err, self.send_timeout)
    }

    fn fold_timeout(&self, err: io::Error, bound: Option<Duration>) -> NetworkError {
        let translated = NetworkError::translate(&err);

        if translated == NetworkError::WouldBlock && !self.nonblocking && bound.is_some() {
            return NetworkError::TimedOut;
        }

        translated
    }
}

impl io::Read for &Endpoint {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut socket = self
            .socket
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "endpoint closed"))?;

        socket.read(buf)
    }
}

impl io::Write for &Endpoint {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "endpoint closed"))?;

        socket.send(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Read for Endpoint {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (&*self).read(buf)
    }
}

impl io::Write for Endpoint {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (&*self).write(buf)
    }

    #[inline]
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_tcp_loopback_roundtrip() {
        let listener = Endpoint::listen_on("127.0.0.1", 0, 1).unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut client = Endpoint::create(Family::Ipv4, Protocol::Tcp).unwrap();
        client.connect("127.0.0.1", port).unwrap();

        let mut server = listener.accept().unwrap();
        assert_eq!(server.family(), Family::Ipv4);
        assert_eq!(server.protocol(), Protocol::Tcp);

        assert_eq!(client.send(b"ping").unwrap(), 4);

        let mut buf = [0u8; 4];
        assert_eq!(server.recv(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"ping");

        assert_eq!(server.send(b"pong").unwrap(), 4);
        assert_eq!(client.recv(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"pong");

        client.close().unwrap();
        client.close().unwrap();
        server.close().unwrap();
        server.close().unwrap();
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut endpoint = Endpoint::create(Family::Ipv4, Protocol::Tcp).unwrap();
        assert!(!endpoint.is_closed());

        endpoint.close().unwrap();
        assert!(endpoint.is_closed());

        endpoint.close().unwrap();
        assert!(endpoint.is_closed());
    }

    #[test]
    fn test_closed_endpoint_rejects_operations() {
        let mut endpoint = Endpoint::create(Family::Ipv4, Protocol::Udp).unwrap();
        endpoint.close().unwrap();

        assert_eq!(endpoint.send(b"x").unwrap_err(), NetworkError::Closed);
        assert_eq!(endpoint.recv(&mut [0u8; 4]).unwrap_err(), NetworkError::Closed);
        assert_eq!(endpoint.bind("127.0.0.1", 0).unwrap_err(), NetworkError::Closed);
        assert_eq!(endpoint.local_addr().unwrap_err(), NetworkError::Closed);
        assert_eq!(endpoint.set_nonblocking(true).unwrap_err(), NetworkError::Closed);
    }

    #[test]
    fn test_create_datagram_metadata() {
        let endpoint = Endpoint::create(Family::Ipv4, Protocol::Udp).unwrap();

        assert_eq!(endpoint.kind(), SocketKind::Datagram);
        assert_eq!(endpoint.protocol(), Protocol::Udp);
        assert!(!endpoint.is_ipv6());
    }

    #[test]
    fn test_high_level_tag_falls_back_to_stream() {
        for proto in [Protocol::Http, Protocol::Mqtt, Protocol::Ldap] {
            let endpoint = Endpoint::create(Family::Ipv4, proto).unwrap();
            assert_eq!(endpoint.kind(), SocketKind::Stream);
            assert_eq!(endpoint.protocol(), proto);
        }
    }

    #[test]
    fn test_bind_any_interface() {
        let endpoint = Endpoint::create(Family::Ipv4, Protocol::Udp).unwrap();
        endpoint.bind("", 0).unwrap();

        let local = endpoint.local_addr().unwrap();
        assert!(local.ip().is_unspecified());
        assert_ne!(local.port(), 0);
    }

    #[test]
    fn test_bind_ipv6_literal() {
        let endpoint = Endpoint::create(Family::Ipv6, Protocol::Udp).unwrap();
        endpoint.bind("::1", 0).unwrap();

        assert_eq!(endpoint.local_addr().unwrap().ip(), "::1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_bind_family_mismatch() {
        let endpoint = Endpoint::create(Family::Ipv4, Protocol::Udp).unwrap();
        let result = endpoint.bind("::1", 0);

        assert_eq!(result.unwrap_err(), NetworkError::InvalidAddress);
    }

    #[test]
    fn test_bind_address_in_use() {
        let first = Endpoint::create(Family::Ipv4, Protocol::Tcp).unwrap();
        first.bind("127.0.0.1", 0).unwrap();
        first.listen(1).unwrap();
        let port = first.local_addr().unwrap().port();

        let second = Endpoint::create(Family::Ipv4, Protocol::Tcp).unwrap();
        let result = second.bind("127.0.0.1", port);

        assert_eq!(result.unwrap_err(), NetworkError::AddrInUse);
    }

    #[test]
    fn test_connect_refused() {
        // Bind a listener to claim a port, then release it so the connect
        // below lands on a closed port.
        let mut probe = Endpoint::listen_on("127.0.0.1", 0, 1).unwrap();
        let port = probe.local_addr().unwrap().port();
        probe.close().unwrap();

        let client = Endpoint::create(Family::Ipv4, Protocol::Tcp).unwrap();
        let result = client.connect("127.0.0.1", port);

        assert_eq!(result.unwrap_err(), NetworkError::Refused);
    }

    #[test]
    fn test_nonblocking_accept_would_block() {
        let mut listener = Endpoint::listen_on("127.0.0.1", 0, 1).unwrap();
        listener.set_nonblocking(true).unwrap();

        assert_eq!(listener.accept().unwrap_err(), NetworkError::WouldBlock);
    }

    #[test]
    fn test_recv_timeout_expires() {
        let mut endpoint = Endpoint::create(Family::Ipv4, Protocol::Udp).unwrap();
        endpoint.bind("127.0.0.1", 0).unwrap();
        endpoint
            .set_timeout(None, Some(Duration::from_millis(50)))
            .unwrap();

        let start = Instant::now();
        let result = endpoint.recv(&mut [0u8; 16]);

        assert_eq!(result.unwrap_err(), NetworkError::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_zero_timeout_disables_bound() {
        let mut endpoint = Endpoint::create(Family::Ipv4, Protocol::Udp).unwrap();
        endpoint.bind("127.0.0.1", 0).unwrap();

        endpoint
            .set_timeout(Some(Duration::ZERO), Some(Duration::ZERO))
            .unwrap();
        endpoint.set_nonblocking(true).unwrap();

        // With the bounds disabled a drained receive reports WouldBlock, not
        // a deadline.
        assert_eq!(endpoint.recv(&mut [0u8; 16]).unwrap_err(), NetworkError::WouldBlock);
    }

    #[test]
    fn test_datagram_addressing_roundtrip() {
        let receiver = Endpoint::create(Family::Ipv4, Protocol::Udp).unwrap();
        receiver.bind("127.0.0.1", 0).unwrap();
        let receiver_port = receiver.local_addr().unwrap().port();

        let sender = Endpoint::create(Family::Ipv4, Protocol::Udp).unwrap();
        sender.bind("127.0.0.1", 0).unwrap();
        let sender_port = sender.local_addr().unwrap().port();

        assert_eq!(sender.send_to(b"hello", "127.0.0.1", receiver_port).unwrap(), 5);

        let mut buf = [0u8; 16];
        let (count, peer) = receiver.recv_from(&mut buf).unwrap();

        assert_eq!(count, 5);
        assert_eq!(&buf[..count], b"hello");
        assert_eq!(peer.port(), sender_port);
        assert_eq!(peer.ip(), "127.0.0.1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_set_broadcast_rejected_on_stream() {
        let endpoint = Endpoint::create(Family::Ipv4, Protocol::Tcp).unwrap();

        assert_eq!(endpoint.set_broadcast(true).unwrap_err(), NetworkError::InvalidInput);
    }

    #[cfg(unix)]
    #[test]
    fn test_option_passthrough_roundtrip() {
        let endpoint = Endpoint::create(Family::Ipv4, Protocol::Tcp).unwrap();

        endpoint
            .set_option(libc::SOL_SOCKET, libc::SO_REUSEADDR, 1)
            .unwrap();

        let value = endpoint.get_option(libc::SOL_SOCKET, libc::SO_REUSEADDR).unwrap();
        assert_ne!(value, 0);
    }

    #[test]
    fn test_wait_times_out_without_traffic() {
        let listener = Endpoint::listen_on("127.0.0.1", 0, 1).unwrap();

        let start = Instant::now();
        let result = listener
            .wait(Readiness::READABLE, Some(Duration::from_millis(100)))
            .unwrap();

        assert!(result.is_empty());
        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[test]
    fn test_wait_reports_pending_connection() {
        let listener = Endpoint::listen_on("127.0.0.1", 0, 1).unwrap();
        let port = listener.local_addr().unwrap().port();

        let client = Endpoint::create(Family::Ipv4, Protocol::Tcp).unwrap();
        client.connect("127.0.0.1", port).unwrap();

        let result = listener
            .wait(Readiness::READABLE, Some(Duration::from_secs(2)))
            .unwrap();

        assert!(result.is_readable());
    }

    #[test]
    fn test_open_rejects_unknown_protocol() {
        let result = Endpoint::open("gopher", "127.0.0.1", 70);

        assert_eq!(result.unwrap_err(), NetworkError::Unsupported);
    }

    #[test]
    fn test_open_closes_partial_endpoint_on_failure() {
        let mut probe = Endpoint::listen_on("127.0.0.1", 0, 1).unwrap();
        let port = probe.local_addr().unwrap().port();
        probe.close().unwrap();

        let result = Endpoint::open("tcp", "127.0.0.1", port);

        assert_eq!(result.unwrap_err(), NetworkError::Refused);
    }

    #[test]
    fn test_open_connects() {
        let listener = Endpoint::listen_on("127.0.0.1", 0, 1).unwrap();
        let port = listener.local_addr().unwrap().port();

        let endpoint = Endpoint::open("tcp", "127.0.0.1", port).unwrap();

        assert_eq!(endpoint.protocol(), Protocol::Tcp);
        assert_eq!(endpoint.peer_addr().unwrap().port(), port);
    }

    #[test]
    fn test_shutdown_write_half() {
        let listener = Endpoint::listen_on("127.0.0.1", 0, 1).unwrap();
        let port = listener.local_addr().unwrap().port();

        let client = Endpoint::create(Family::Ipv4, Protocol::Tcp).unwrap();
        client.connect("127.0.0.1", port).unwrap();
        let server = listener.accept().unwrap();

        client.shutdown(Shutdown::Write).unwrap();

        // The server observes the half-close as an orderly zero-length read.
        assert_eq!(server.recv(&mut [0u8; 8]).unwrap(), 0);
    }

    #[test]
    fn test_init_and_cleanup() {
        init().unwrap();
        cleanup();
    }
}
