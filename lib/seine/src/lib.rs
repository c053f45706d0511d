//! `seine` is a cross-platform networking toolkit: a uniform endpoint over the
//! platform socket APIs, a readiness multiplexer, length-prefixed and WebSocket
//! framing, a TLS session wrapper, datagram services and a small cluster
//! membership registry.

pub mod cluster;
pub mod datagram;
pub mod endpoint;
pub mod error;
pub mod frame;
pub mod http;
pub mod poller;
pub mod protocol;
pub mod resolve;
pub mod tls;
pub mod ws;

mod sys;

pub use crate::endpoint::{init, cleanup, Endpoint, Family, SocketKind};
pub use crate::error::{NetworkError, NetworkResult};
pub use crate::poller::{Multiplexer, Readiness};
pub use crate::protocol::Protocol;
