//! Identifier Space
//!
//! Fixed-length digit vectors shared by every other component: node ids,
//! hashed object keys and the prefix/distance arithmetic routing is built on.

pub mod types;

pub use types::{BASE, DIGITS, Distance, Id, digit_at, digit_gap, distance, equal, shared_prefix_len};
