use dashmap::DashMap;

use super::types::Node;
use crate::identifier::{DIGITS, Id};

/// Peers that hold the local node in their routing table, grouped by the level
/// of the cell they keep us in. Only used to notify them; never routed on.
pub struct Backpointers {
    local: Node,
    levels: Vec<DashMap<Id, Node>>,
}

impl Backpointers {
    pub fn new(local: Node) -> Self {
        Self {
            local,
            levels: (0..DIGITS).map(|_| DashMap::new()).collect(),
        }
    }

    /// Records `node`; returns `false` if it was already known or is the local node.
    pub fn add(&self, node: Node) -> bool {
        let level = self.local.id.shared_prefix_len(&node.id);
        if level == DIGITS {
            return false;
        }
        self.levels[level].insert(node.id, node).is_none()
    }

    pub fn remove(&self, id: &Id) -> bool {
        let level = self.local.id.shared_prefix_len(id);
        if level == DIGITS {
            return false;
        }
        self.levels[level].remove(id).is_some()
    }

    pub fn contains(&self, id: &Id) -> bool {
        let level = self.local.id.shared_prefix_len(id);
        level < DIGITS && self.levels[level].contains_key(id)
    }

    pub fn get(&self, level: usize) -> Vec<Node> {
        match self.levels.get(level) {
            Some(map) => map.iter().map(|entry| entry.value().clone()).collect(),
            None => Vec::new(),
        }
    }

    /// Snapshot of every backpointer with its level.
    pub fn all(&self) -> Vec<(usize, Node)> {
        self.levels
            .iter()
            .enumerate()
            .flat_map(|(level, map)| {
                map.iter()
                    .map(|entry| (level, entry.value().clone()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.levels.iter().map(|map| map.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        for map in self.levels.iter() {
            map.clear();
        }
    }
}
