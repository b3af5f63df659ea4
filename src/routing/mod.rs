//! Routing State
//!
//! Per-node view of the mesh. The routing table maps `(level, digit)` cells to a
//! few known neighbours and answers next-hop queries; the backpointer set
//! remembers which peers reference this node so they can be told when it changes.
//!
//! ## Concurrency
//! Both structures are sharded `DashMap`s: join and leave notifications touching
//! unrelated cells proceed in parallel, and every exposed operation works on a
//! single cell (or returns an owned snapshot), so no guard outlives a call.

pub mod backpointers;
pub mod table;
pub mod types;

#[cfg(test)]
mod tests;
