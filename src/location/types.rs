use serde::{Deserialize, Serialize};

use crate::identifier::Id;
use crate::routing::types::Node;

/// A key salted with a replica index; each replica has its own root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplicaKey {
    pub key: String,
    pub replica: u8,
}

impl ReplicaKey {
    pub fn new(key: &str, replica: u8) -> Self {
        Self {
            key: key.to_string(),
            replica,
        }
    }

    /// Identifier of `key || 0x00 || replica`.
    pub fn id(&self) -> Id {
        let mut bytes = Vec::with_capacity(self.key.len() + 2);
        bytes.extend_from_slice(self.key.as_bytes());
        bytes.push(0);
        bytes.push(self.replica);
        Id::hash(&bytes)
    }
}

/// Where an object can be found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Locator {
    /// The payload itself, kept at the root.
    Value(Vec<u8>),
    /// The node keeping the payload in its blob store.
    Holder(Node),
}

/// What a publisher asks a root to remember.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub locator: Locator,
    pub publisher: Id,
}
