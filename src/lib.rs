//! Tapestry Overlay Mesh Library
//!
//! A structured peer-to-peer overlay: nodes with fixed-length hexadecimal
//! identifiers organize into a prefix-routing mesh in which every key has a
//! unique live root, reachable from any node in a bounded number of hops.
//! The crate serves as the foundation for the node binary (`main.rs`).
//!
//! ## Architecture Modules
//! - **`identifier`**: The identifier space: digits, prefixes, distances and key hashing.
//! - **`routing`**: Per-node routing table (surrogate next-hop selection) and backpointers.
//! - **`node`**: The `TapestryNode`: root resolution, join/leave membership and
//!   the background maintenance loops.
//! - **`location`**: Object location on top of roots: publish, locate, soft-state
//!   records and their migration as membership changes.
//! - **`rpc`**: The typed peer protocol, its transports (HTTP and in-memory) and
//!   the node's HTTP handlers.
//! - **`client`**: The filesystem-facing boundary: a consistency layer mapping
//!   stable meta keys to versioned storage keys.
//! - **`config`** / **`error`**: Node settings and the shared error taxonomy.

pub mod client;
pub mod config;
pub mod error;
pub mod identifier;
pub mod location;
pub mod node;
pub mod routing;
pub mod rpc;
