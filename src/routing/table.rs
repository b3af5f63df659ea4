use dashmap::DashMap;

use super::types::{Cell, Node};
use crate::identifier::{BASE, DIGITS, Id};

/// Maximum number of neighbours kept per cell.
pub const SLOT_SIZE: usize = 3;

/// Result of offering a node to the table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AddOutcome {
    /// The node now occupies a slot (and was not there before).
    pub added: bool,
    /// A previous occupant pushed out to make room.
    pub evicted: Option<Node>,
}

/// The local node's view of the mesh, indexed by `(level, digit)`.
///
/// Slots are ordered by closeness to the owner; when a full slot is offered a
/// closer node, the furthest one is evicted.
pub struct RoutingTable {
    local: Node,
    cells: DashMap<Cell, Vec<Node>>,
}

impl RoutingTable {
    pub fn new(local: Node) -> Self {
        Self {
            local,
            cells: DashMap::new(),
        }
    }

    pub fn local(&self) -> &Node {
        &self.local
    }

    /// Offers `node` to the cell it belongs in.
    pub fn add(&self, node: Node) -> AddOutcome {
        let Some(cell) = Cell::of(&self.local.id, &node.id) else {
            return AddOutcome::default();
        };

        let mut slot = self.cells.entry(cell).or_default();

        if let Some(existing) = slot.iter_mut().find(|n| n.id == node.id) {
            // Same identity, possibly a new address after a restart.
            existing.addr = node.addr;
            return AddOutcome::default();
        }

        let local_id = self.local.id;
        let key = node.id.distance(&local_id);
        let pos = slot
            .iter()
            .position(|n| n.id.distance(&local_id) > key)
            .unwrap_or(slot.len());
        slot.insert(pos, node.clone());

        if slot.len() > SLOT_SIZE {
            let evicted = slot.pop();
            if evicted.as_ref().map(|e| e.id) == Some(node.id) {
                return AddOutcome::default();
            }
            return AddOutcome {
                added: true,
                evicted,
            };
        }

        AddOutcome {
            added: true,
            evicted: None,
        }
    }

    /// Removes the node with `id`; returns whether it was present.
    pub fn remove(&self, id: &Id) -> bool {
        let Some(cell) = Cell::of(&self.local.id, id) else {
            return false;
        };

        let removed = match self.cells.get_mut(&cell) {
            Some(mut slot) => {
                let before = slot.len();
                slot.retain(|n| n.id != *id);
                slot.len() != before
            }
            None => false,
        };

        self.cells.remove_if(&cell, |_, slot| slot.is_empty());
        removed
    }

    pub fn contains(&self, id: &Id) -> bool {
        Cell::of(&self.local.id, id)
            .and_then(|cell| self.cells.get(&cell))
            .map(|slot| slot.iter().any(|n| n.id == *id))
            .unwrap_or(false)
    }

    pub fn slot(&self, cell: Cell) -> Vec<Node> {
        self.cells
            .get(&cell)
            .map(|slot| slot.clone())
            .unwrap_or_default()
    }

    /// Every node in row `level`, cell by cell in digit order.
    pub fn level(&self, level: usize) -> Vec<Node> {
        (0..BASE)
            .flat_map(|digit| {
                self.slot(Cell {
                    level,
                    digit: digit as u8,
                })
            })
            .collect()
    }

    /// Owned snapshot of every entry.
    pub fn nodes(&self) -> Vec<Node> {
        let mut cells: Vec<(Cell, Vec<Node>)> = self
            .cells
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        cells.sort_by_key(|(cell, _)| *cell);
        cells.into_iter().flat_map(|(_, slot)| slot).collect()
    }

    pub fn len(&self) -> usize {
        self.cells.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry, returning what was removed.
    pub fn clear(&self) -> Vec<Node> {
        let nodes = self.nodes();
        self.cells.clear();
        nodes
    }

    /// Surrogate-routing step toward `target`; returns the local node when it is the root.
    ///
    /// Starting at the shared-prefix level, each level is scanned upward from the
    /// target's digit (wrapping at `BASE`). Reaching the local node's own digit
    /// first means the local node stands in for that level and the scan moves one
    /// level down; reaching a populated cell first yields the entry of that cell
    /// numerically closest to the target.
    pub fn next_hop(&self, target: &Id) -> Node {
        let start = self.local.id.shared_prefix_len(target);

        for level in start..DIGITS {
            let wanted = target.digit_at(level) as usize;
            let own = self.local.id.digit_at(level);

            for step in 0..BASE {
                let digit = ((wanted + step) % BASE) as u8;
                if digit == own {
                    break;
                }
                if let Some(slot) = self.cells.get(&Cell { level, digit })
                    && let Some(best) = slot.iter().min_by_key(|n| n.id.distance(target))
                {
                    return best.clone();
                }
            }
        }

        self.local.clone()
    }

    /// Best stand-in for the local node in a peer whose cell for us sits at `level`.
    ///
    /// Any entry sharing more than `level` digits with the local node fits that
    /// same cell; the one closest to the local node is preferred.
    pub fn replacement_for(&self, level: usize) -> Option<Node> {
        let local_id = self.local.id;
        ((level + 1)..DIGITS)
            .flat_map(|l| self.level(l))
            .min_by_key(|n| n.id.distance(&local_id))
    }
}
