//! Cluster membership registry: a bounded table of peers with identity
//! dedup, activity flags, heartbeats and best-effort datagram fan-out.

use crate::endpoint::{Endpoint, Family};
use crate::error::{NetworkError, NetworkResult};
use crate::protocol::Protocol;
use ballast::logging;
use ballast::time::timestamp_secs;
use std::net::IpAddr;
use std::sync::Mutex;

pub const MAX_NODES: usize = 32;
/// Field limits, including the terminator slot of the wire layout.
pub const MAX_ID_LEN: usize = 64;
pub const MAX_ADDR_LEN: usize = 64;
pub const MAX_METADATA_LEN: usize = 128;

/// One registry record: a reachable peer identified by its node id.
#[derive(Debug, Clone)]
pub struct Node {
    id: String,
    address: String,
    port: u16,
    active: bool,
    last_heartbeat: u64,
    metadata: String,
}

impl Node {
    /// Validates identity and address against the field limits.
    pub fn new(id: &str, address: &str, port: u16) -> NetworkResult<Node> {
        if id.is_empty() || id.len() >= MAX_ID_LEN {
            return Err(NetworkError::InvalidInput);
        }
        if address.is_empty() || address.len() >= MAX_ADDR_LEN {
            return Err(NetworkError::InvalidInput);
        }

        Ok(Node {
            id: id.to_owned(),
            address: address.to_owned(),
            port,
            active: false,
            last_heartbeat: 0,
            metadata: String::new(),
        })
    }

    /// Attaches opaque metadata. Oversize metadata is rejected, not
    /// truncated.
    pub fn with_metadata(mut self, metadata: &str) -> NetworkResult<Node> {
        if metadata.len() >= MAX_METADATA_LEN {
            return Err(NetworkError::InvalidInput);
        }

        self.metadata = metadata.to_owned();

        Ok(self)
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn address(&self) -> &str {
        &self.address
    }

    #[inline]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[inline]
    pub fn last_heartbeat(&self) -> u64 {
        self.last_heartbeat
    }

    #[inline]
    pub fn metadata(&self) -> &str {
        &self.metadata
    }
}

struct Inner {
    nodes: Vec<Node>,
    self_id: Option<String>,
}

/// Process-wide membership table. All access is serialized through one lock;
/// membership churn is rare and the table is small.
pub struct ClusterRegistry {
    inner: Mutex<Inner>,
    log: logging::Logger,
}

impl ClusterRegistry {
    pub fn new<'a, L: Into<Option<&'a logging::Logger>>>(log: L) -> ClusterRegistry {
        ClusterRegistry {
            inner: Mutex::new(Inner {
                nodes: Vec::new(),
                self_id: None,
            }),
            log: logging::child(log),
        }
    }

    /// Stores the self record and appends it to the table, then appends each
    /// viable seed. Seeds are best-effort: entries with a zero port are
    /// skipped, and a full table drops the remainder.
    pub fn join(&self, self_node: &Node, seeds: &[Node]) -> NetworkResult<()> {
        let mut inner = self.lock();

        inner.self_id = Some(self_node.id.clone());
        Self::add_node(&mut inner, self_node, &self.log);

        for seed in seeds {
            if seed.port == 0 {
                logging::debug!(self.log, "seed skipped"; "id" => &seed.id);
                continue;
            }

            if Self::add_node(&mut inner, seed, &self.log) {
                logging::info!(self.log, "seed node discovered";
                               "id" => &seed.id,
                               "address" => &seed.address,
                               "port" => seed.port,
                               "metadata" => &seed.metadata);
            }
        }

        Ok(())
    }

    /// Sends the payload to every active member except self, over a fresh
    /// datagram endpoint per destination. Per-destination failures are
    /// logged and swallowed; the fan-out itself always succeeds.
    pub fn broadcast(&self, payload: &[u8]) -> NetworkResult<()> {
        if payload.is_empty() {
            return Err(NetworkError::InvalidInput);
        }

        let targets: Vec<(String, u16)> = {
            let inner = self.lock();
            let self_id = inner.self_id.clone();

            inner
                .nodes
                .iter()
                .filter(|node| node.active && Some(&node.id) != self_id.as_ref())
                .map(|node| (node.address.clone(), node.port))
                .collect()
        };

        for (address, port) in targets {
            if let Err(err) = Self::send_one(&address, port, payload) {
                logging::debug!(self.log, "broadcast destination dropped";
                                "address" => &address,
                                "port" => port,
                                "error" => %err);
            }
        }

        Ok(())
    }

    /// Marks the self record inactive. The entry stays in the table for
    /// introspection and is excluded from future broadcasts.
    pub fn leave(&self) -> NetworkResult<()> {
        let mut inner = self.lock();

        let self_id = inner.self_id.clone().ok_or(NetworkError::InvalidInput)?;

        for node in &mut inner.nodes {
            if node.id == self_id {
                node.active = false;
                logging::info!(self.log, "node left"; "id" => &self_id);
                return Ok(());
            }
        }

        Err(NetworkError::InvalidInput)
    }

    /// Advances the self record's heartbeat to the current wall-clock
    /// second. Never moves it backwards.
    pub fn heartbeat(&self) -> NetworkResult<u64> {
        let mut inner = self.lock();

        let self_id = inner.self_id.clone().ok_or(NetworkError::InvalidInput)?;
        let now = timestamp_secs();

        for node in &mut inner.nodes {
            if node.id == self_id {
                node.last_heartbeat = node.last_heartbeat.max(now);
                return Ok(node.last_heartbeat);
            }
        }

        Err(NetworkError::InvalidInput)
    }

    /// Snapshot of up to `max` entries in table order, inactive entries
    /// included; the activity flag travels with each record.
    pub fn nodes(&self, max: usize) -> Vec<Node> {
        let inner = self.lock();

        inner.nodes.iter().take(max).cloned().collect()
    }

    /// Number of entries in the table, active or not.
    pub fn len(&self) -> usize {
        self.lock().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends a node unless its id is already present. Returns true when a
    /// new entry was added; "already present" counts as success.
    fn add_node(inner: &mut Inner, node: &Node, log: &logging::Logger) -> bool {
        if inner.nodes.iter().any(|existing| existing.id == node.id) {
            return false;
        }

        if inner.nodes.len() >= MAX_NODES {
            logging::warn!(log, "membership table full"; "id" => &node.id);
            return false;
        }

        let mut entry = node.clone();
        entry.active = true;
        inner.nodes.push(entry);

        true
    }

    fn send_one(address: &str, port: u16, payload: &[u8]) -> NetworkResult<()> {
        let family = match address.parse::<IpAddr>() {
            Ok(IpAddr::V6(_)) => Family::Ipv6,
            _ => Family::Ipv4,
        };

        let mut endpoint = Endpoint::create(family, Protocol::Udp)?;
        let outcome = endpoint.send_to(payload, address, port).map(|_| ());
        endpoint.close()?;

        outcome
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("Cluster registry lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datagram::udp_bind;

    fn three_node_registry() -> ClusterRegistry {
        let registry = ClusterRegistry::new(None);

        let n1 = Node::new("n1", "127.0.0.1", 9001).unwrap();
        let seeds = vec![
            Node::new("n2", "127.0.0.2", 9002).unwrap(),
            Node::new("n3", "127.0.0.3", 9003).unwrap(),
        ];

        registry.join(&n1, &seeds).unwrap();
        registry
    }

    #[test]
    fn test_join_registers_self_and_seeds() {
        let registry = three_node_registry();

        let nodes = registry.nodes(16);
        assert_eq!(nodes.len(), 3);

        let ids: Vec<&str> = nodes.iter().map(Node::id).collect();
        assert_eq!(ids, vec!["n1", "n2", "n3"]);
        assert!(nodes.iter().all(Node::is_active));
    }

    #[test]
    fn test_join_deduplicates_by_id() {
        let registry = three_node_registry();

        let n1_again = Node::new("n1", "10.0.0.1", 1234).unwrap();
        let n2_again = Node::new("n2", "10.0.0.2", 5678).unwrap();
        registry.join(&n1_again, &[n2_again]).unwrap();

        assert_eq!(registry.len(), 3);
        // The original addresses survive; join does not overwrite.
        assert_eq!(registry.nodes(16)[0].address(), "127.0.0.1");
    }

    #[test]
    fn test_join_skips_portless_seeds() {
        let registry = ClusterRegistry::new(None);

        let this = Node::new("n1", "127.0.0.1", 9001).unwrap();
        let dead_seed = Node::new("n2", "127.0.0.2", 0).unwrap();

        registry.join(&this, &[dead_seed]).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_table_capacity_is_bounded() {
        let registry = ClusterRegistry::new(None);

        let this = Node::new("n0", "127.0.0.1", 9000).unwrap();
        let seeds: Vec<Node> = (1..40)
            .map(|i| Node::new(&format!("n{}", i), "127.0.0.1", 9000 + i as u16).unwrap())
            .collect();

        registry.join(&this, &seeds).unwrap();
        assert_eq!(registry.len(), MAX_NODES);
    }

    #[test]
    fn test_broadcast_swallows_unreachable_members() {
        let registry = three_node_registry();

        // Nothing listens on the seed addresses; fan-out still succeeds.
        registry.broadcast(b"hi").unwrap();
    }

    #[test]
    fn test_broadcast_rejects_empty_payload() {
        let registry = three_node_registry();

        assert_eq!(registry.broadcast(b"").unwrap_err(), NetworkError::InvalidInput);
    }

    #[test]
    fn test_broadcast_reaches_member() {
        let receiver = udp_bind("127.0.0.1", 0).unwrap();
        let port = receiver.local_addr().unwrap().port();

        let registry = ClusterRegistry::new(None);
        let this = Node::new("self", "127.0.0.1", 9001).unwrap();
        let member = Node::new("peer", "127.0.0.1", port).unwrap();
        registry.join(&this, &[member]).unwrap();

        registry.broadcast(b"payload").unwrap();

        let mut buf = [0u8; 32];
        let count = receiver.recv(&mut buf).unwrap();
        assert_eq!(&buf[..count], b"payload");
    }

    #[test]
    fn test_broadcast_excludes_self() {
        let receiver = udp_bind("127.0.0.1", 0).unwrap();
        let port = receiver.local_addr().unwrap().port();

        let registry = ClusterRegistry::new(None);
        let this = Node::new("self", "127.0.0.1", port).unwrap();
        registry.join(&this, &[]).unwrap();

        registry.broadcast(b"echo?").unwrap();

        let mut probe = receiver;
        probe
            .set_timeout(None, Some(std::time::Duration::from_millis(100)))
            .unwrap();
        assert_eq!(probe.recv(&mut [0u8; 8]).unwrap_err(), NetworkError::TimedOut);
    }

    #[test]
    fn test_leave_marks_inactive_but_keeps_entry() {
        let registry = three_node_registry();

        registry.leave().unwrap();

        let nodes = registry.nodes(16);
        assert_eq!(nodes.len(), 3);
        assert!(!nodes[0].is_active());
        assert!(nodes[1].is_active());
        assert!(nodes[2].is_active());
    }

    #[test]
    fn test_leave_without_join_rejected() {
        let registry = ClusterRegistry::new(None);

        assert_eq!(registry.leave().unwrap_err(), NetworkError::InvalidInput);
    }

    #[test]
    fn test_heartbeat_is_nondecreasing() {
        let registry = three_node_registry();

        let first = registry.heartbeat().unwrap();
        let second = registry.heartbeat().unwrap();

        assert!(first > 0);
        assert!(second >= first);
        assert_eq!(registry.nodes(1)[0].last_heartbeat(), second);
    }

    #[test]
    fn test_node_field_limits() {
        let long_id = "x".repeat(MAX_ID_LEN);
        assert_eq!(
            Node::new(&long_id, "127.0.0.1", 1).unwrap_err(),
            NetworkError::InvalidInput
        );

        let max_id = "x".repeat(MAX_ID_LEN - 1);
        Node::new(&max_id, "127.0.0.1", 1).unwrap();

        let node = Node::new("n", "127.0.0.1", 1).unwrap();
        assert_eq!(
            node.with_metadata(&"m".repeat(MAX_METADATA_LEN)).unwrap_err(),
            NetworkError::InvalidInput
        );

        let node = Node::new("n", "127.0.0.1", 1).unwrap();
        let node = node.with_metadata("zone=a").unwrap();
        assert_eq!(node.metadata(), "zone=a");
    }

    #[test]
    fn test_empty_identity_rejected() {
        assert_eq!(
            Node::new("", "127.0.0.1", 1).unwrap_err(),
            NetworkError::InvalidInput
        );
        assert_eq!(Node::new("n", "", 1).unwrap_err(), NetworkError::InvalidInput);
    }
}
