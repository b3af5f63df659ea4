use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::identifier::Id;

/// A participant of the mesh: its identity and where to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Node {
    pub id: Id,
    pub addr: SocketAddr,
}

impl Node {
    pub fn new(id: Id, addr: SocketAddr) -> Self {
        Self { id, addr }
    }
}

/// Coordinates of a routing table slot.
///
/// A node `n` belongs in cell `(level, digit)` of the table owned by `local`
/// when the two share exactly `level` leading digits and `n`'s digit at
/// `level` is `digit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub level: usize,
    pub digit: u8,
}

impl Cell {
    /// `None` when both ids are equal: a node has no cell in its own table.
    pub fn of(local: &Id, other: &Id) -> Option<Cell> {
        let level = local.shared_prefix_len(other);
        if level == crate::identifier::DIGITS {
            return None;
        }
        Some(Cell {
            level,
            digit: other.digit_at(level),
        })
    }
}
