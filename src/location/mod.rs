//! Object Location Service
//!
//! Lets a key's bytes, or a pointer to the node holding them, be found through
//! the key's root.
//!
//! ## Core Concepts
//! - **Replicas**: every key is published under several salted identifiers, so a
//!   single root failure between republish rounds does not hide the object.
//! - **Soft state**: roots keep records for a limited time; publishers republish
//!   periodically, which also repopulates a root that replaced a crashed one.
//! - **Migration**: records follow the root when a closer node joins or the root
//!   leaves gracefully.

pub mod service;
pub mod store;
pub mod types;
