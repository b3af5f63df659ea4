//! Filesystem-facing Client
//!
//! The overlay stores immutable versions; a consistency layer maps each stable
//! meta key to the storage key of its current version.
//!
//! ## Core Concepts
//! - **Meta keys**: derived from a typed `BlockKey` (inode, indirect block or
//!   numbered data block of a path), hashed into the identifier space.
//! - **Storage keys**: a fresh UUID per written version, so a write never
//!   overwrites bytes another reader may still be fetching.
//! - **Consistency**: any linearizable key/value service implementing
//!   `Consistency`; `MemoryConsistency` serves tests and single-process use.

pub mod consistency;
pub mod versioned;

pub use consistency::{Consistency, MemoryConsistency};
pub use versioned::{BlockKey, BlockPart, VersionedStore};
