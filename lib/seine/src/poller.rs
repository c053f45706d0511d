//! Readiness multiplexer. A `Multiplexer` owns a set of registrations over
//! borrowed endpoints and reflects one bounded OS poll back into them.

use crate::endpoint::Endpoint;
use crate::error::{NetworkError, NetworkResult};
use crate::sys;
use ballast::logging;
use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::time::Duration;

/// Three-bit readiness mask: bit 0 readable, bit 1 writable, bit 2 error.
/// Used both for requested interest and for poll results.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Readiness(u8);

impl Readiness {
    pub const EMPTY: Readiness = Readiness(0);
    pub const READABLE: Readiness = Readiness(0b001);
    pub const WRITABLE: Readiness = Readiness(0b010);
    pub const ERROR: Readiness = Readiness(0b100);

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn is_readable(self) -> bool {
        self.contains(Self::READABLE)
    }

    #[inline]
    pub fn is_writable(self) -> bool {
        self.contains(Self::WRITABLE)
    }

    #[inline]
    pub fn is_error(self) -> bool {
        self.contains(Self::ERROR)
    }

    #[inline]
    pub fn contains(self, other: Readiness) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for Readiness {
    type Output = Readiness;

    #[inline]
    fn bitor(self, rhs: Readiness) -> Readiness {
        Readiness(self.0 | rhs.0)
    }
}

impl BitOrAssign for Readiness {
    #[inline]
    fn bitor_assign(&mut self, rhs: Readiness) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Readiness {
    type Output = Readiness;

    #[inline]
    fn bitand(self, rhs: Readiness) -> Readiness {
        Readiness(self.0 & rhs.0)
    }
}

/// One watched endpoint: the snapshotted descriptor, the caller's token, the
/// requested interest and the result of the last poll.
#[derive(Debug, Copy, Clone)]
struct Registration {
    descriptor: sys::RawDescriptor,
    token: usize,
    interest: Readiness,
    result: Readiness,
}

/// Registration-based readiness poller. Registrations borrow the endpoint's
/// descriptor without taking ownership; closing an endpoint behind a live
/// registration surfaces as an `ERROR` result on the next poll.
pub struct Multiplexer {
    slots: Vec<Registration>,
    log: logging::Logger,
}

impl Multiplexer {
    const INITIAL_SLOTS: usize = 8;

    /// Fresh multiplexer with room for a few registrations. The slot array
    /// doubles whenever it fills up.
    pub fn new<'a, L: Into<Option<&'a logging::Logger>>>(log: L) -> Multiplexer {
        Multiplexer {
            slots: Vec::with_capacity(Self::INITIAL_SLOTS),
            log: logging::child(log),
        }
    }

    /// Appends a registration for the endpoint under the caller's token.
    pub fn register(
        &mut self,
        endpoint: &Endpoint,
        interest: Readiness,
        token: usize,
    ) -> NetworkResult<()> {
        let descriptor = endpoint.descriptor()?;

        logging::trace!(self.log, "endpoint registered";
                        "token" => token,
                        "interest" => interest.bits(),
                        "slots" => self.slots.len() + 1);

        self.slots.push(Registration {
            descriptor,
            token,
            interest,
            result: Readiness::EMPTY,
        });

        Ok(())
    }

    /// Number of registrations.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drops every registration.
    #[inline]
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// One bounded wait over the whole registration set. The timeout is an
    /// upper bound; the call returns as soon as any endpoint is ready.
    /// Returns the count of ready endpoints, zero on timeout.
    pub fn poll(&mut self, timeout: Option<Duration>) -> NetworkResult<usize> {
        if self.slots.is_empty() {
            return Err(NetworkError::InvalidInput);
        }

        let mut entries: Vec<sys::PollFd> = self
            .slots
            .iter()
            .map(|slot| sys::pollfd(slot.descriptor, slot.interest))
            .collect();

        let ready = sys::poll(&mut entries, timeout_ms(timeout)).map_err(NetworkError::from)?;

        for (slot, entry) in self.slots.iter_mut().zip(entries.iter()) {
            slot.result = sys::readiness(entry);
        }

        logging::trace!(self.log, "poll returned";
                        "ready" => ready,
                        "slots" => self.slots.len());

        Ok(ready)
    }

    /// Ready registrations from the last poll as `(token, result)` pairs, in
    /// registration order. No fairness among them is implied.
    pub fn ready(&self) -> impl Iterator<Item = (usize, Readiness)> + '_ {
        self.slots
            .iter()
            .filter(|slot| !slot.result.is_empty())
            .map(|slot| (slot.token, slot.result))
    }
}

/// Single-endpoint wait with the multiplexer's semantics.
pub(crate) fn poll_single(
    descriptor: sys::RawDescriptor,
    interest: Readiness,
    timeout: Option<Duration>,
) -> NetworkResult<Readiness> {
    let mut entries = [sys::pollfd(descriptor, interest)];

    let ready = sys::poll(&mut entries, timeout_ms(timeout)).map_err(NetworkError::from)?;

    if ready == 0 {
        return Ok(Readiness::EMPTY);
    }

    Ok(sys::readiness(&entries[0]))
}

#[inline]
fn timeout_ms(timeout: Option<Duration>) -> i32 {
    match timeout {
        Some(bound) => bound.as_millis().min(i32::MAX as u128) as i32,
        None => -1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Family;
    use crate::protocol::Protocol;
    use std::time::Instant;

    fn udp_pair() -> (Endpoint, Endpoint) {
        let a = Endpoint::create(Family::Ipv4, Protocol::Udp).unwrap();
        a.bind("127.0.0.1", 0).unwrap();
        let b = Endpoint::create(Family::Ipv4, Protocol::Udp).unwrap();
        b.bind("127.0.0.1", 0).unwrap();
        (a, b)
    }

    #[test]
    fn test_readiness_bits() {
        let mask = Readiness::READABLE | Readiness::ERROR;

        assert!(mask.is_readable());
        assert!(!mask.is_writable());
        assert!(mask.is_error());
        assert_eq!(mask.bits(), 0b101);
        assert!(mask.contains(Readiness::READABLE));
        assert!(!mask.contains(Readiness::WRITABLE));
        assert!(Readiness::EMPTY.is_empty());
    }

    #[test]
    fn test_poll_timeout_bound() {
        let listener = Endpoint::listen_on("127.0.0.1", 0, 1).unwrap();

        let mut mux = Multiplexer::new(None);
        mux.register(&listener, Readiness::READABLE, 7).unwrap();

        let start = Instant::now();
        let ready = mux.poll(Some(Duration::from_millis(100))).unwrap();
        let elapsed = start.elapsed();

        assert_eq!(ready, 0);
        // Scheduling epsilon: the syscall may round the bound down slightly.
        assert!(elapsed >= Duration::from_millis(90), "returned after {:?}", elapsed);
        assert_eq!(mux.ready().count(), 0);
    }

    #[test]
    fn test_poll_empty_set_rejected() {
        let mut mux = Multiplexer::new(None);
        assert_eq!(mux.poll(None).unwrap_err(), NetworkError::InvalidInput);
    }

    #[test]
    fn test_ready_in_registration_order() {
        let (first, second) = udp_pair();
        let sender = Endpoint::create(Family::Ipv4, Protocol::Udp).unwrap();

        let first_port = first.local_addr().unwrap().port();
        let second_port = second.local_addr().unwrap().port();

        // Make the *second* registration ready first; order must still follow
        // registration order.
        sender.send_to(b"x", "127.0.0.1", second_port).unwrap();
        sender.send_to(b"y", "127.0.0.1", first_port).unwrap();

        let mut mux = Multiplexer::new(None);
        mux.register(&first, Readiness::READABLE, 10).unwrap();
        mux.register(&second, Readiness::READABLE, 20).unwrap();

        let ready = mux.poll(Some(Duration::from_secs(2))).unwrap();
        assert_eq!(ready, 2);

        let tokens: Vec<usize> = mux.ready().map(|(token, _)| token).collect();
        assert_eq!(tokens, vec![10, 20]);

        for (_, result) in mux.ready() {
            assert!(result.is_readable());
        }
    }

    #[test]
    fn test_slot_growth_past_initial_capacity() {
        let mut endpoints = Vec::new();
        for _ in 0..(Multiplexer::INITIAL_SLOTS * 2) {
            let ep = Endpoint::create(Family::Ipv4, Protocol::Udp).unwrap();
            ep.bind("127.0.0.1", 0).unwrap();
            endpoints.push(ep);
        }

        let mut mux = Multiplexer::new(None);
        for (i, ep) in endpoints.iter().enumerate() {
            mux.register(ep, Readiness::READABLE, i).unwrap();
        }

        assert_eq!(mux.len(), Multiplexer::INITIAL_SLOTS * 2);
        assert_eq!(mux.poll(Some(Duration::from_millis(10))).unwrap(), 0);
    }

    #[test]
    fn test_register_closed_endpoint_rejected() {
        let mut ep = Endpoint::create(Family::Ipv4, Protocol::Udp).unwrap();
        ep.close().unwrap();

        let mut mux = Multiplexer::new(None);
        let result = mux.register(&ep, Readiness::READABLE, 0);

        assert_eq!(result.unwrap_err(), NetworkError::Closed);
    }

    #[test]
    fn test_clear_drops_registrations() {
        let (first, _second) = udp_pair();

        let mut mux = Multiplexer::new(None);
        mux.register(&first, Readiness::READABLE, 1).unwrap();
        assert_eq!(mux.len(), 1);

        mux.clear();
        assert!(mux.is_empty());
    }
}
