//! Overlay Node
//!
//! A `TapestryNode` ties the routing state to the peer protocol: it answers
//! inbound requests, resolves roots hop by hop, and runs the join and leave
//! procedures that keep every table consistent with the live membership.
//!
//! ## Core Mechanisms
//! - **Root resolution**: the querying node drives the walk, asking each hop for
//!   its next hop and routing around hops that fail.
//! - **Join**: the newcomer copies tables along the path to its surrogate root,
//!   is announced by an acknowledged multicast to every node sharing its prefix,
//!   then fills the lower rows through backpointer traversal.
//! - **Leave**: nodes referencing the leaver are offered a replacement; records
//!   it held as root move to their new roots.
//! - **Maintenance**: background loops probe neighbours, republish owned keys
//!   and expire stale records.

pub mod maintenance;
pub mod membership;
pub mod resolve;
pub mod service;

pub use resolve::Route;
pub use service::TapestryNode;

#[cfg(test)]
pub(crate) mod testing;

#[cfg(test)]
mod tests;
