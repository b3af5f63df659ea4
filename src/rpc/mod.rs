//! Peer RPC Surface
//!
//! A closed, versioned set of typed requests exchanged between nodes, the
//! `Transport` seam they travel through, and the HTTP handlers a node serves.
//!
//! ## Transports
//! - **HttpTransport**: bincode envelopes over pooled `reqwest` connections,
//!   with a per-call timeout and a short jittered retry.
//! - **MemoryNetwork**: an in-process registry used by tests and simulations;
//!   messages still pass through the wire codec, and removing a node makes it
//!   look crashed.

pub mod handlers;
pub mod http;
pub mod memory;
pub mod protocol;
pub mod transport;

pub use http::HttpTransport;
pub use memory::MemoryNetwork;
pub use transport::{Peer, RpcHandler, Transport};
