use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::consistency::Consistency;
use crate::error::{OverlayError, Result};
use crate::identifier::Id;
use crate::node::TapestryNode;

/// Which block of a path a meta key names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockPart {
    Inode,
    Indirect,
    Data(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockKey {
    pub path: String,
    pub part: BlockPart,
}

impl BlockKey {
    pub fn inode(path: &str) -> Self {
        Self {
            path: path.to_string(),
            part: BlockPart::Inode,
        }
    }

    pub fn indirect(path: &str) -> Self {
        Self {
            path: path.to_string(),
            part: BlockPart::Indirect,
        }
    }

    pub fn data(path: &str, block: u32) -> Self {
        Self {
            path: path.to_string(),
            part: BlockPart::Data(block),
        }
    }

    /// Stable name of this block in the consistency layer.
    pub fn meta_key(&self) -> String {
        Id::hash(self.to_string().as_bytes()).to_string()
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.part {
            BlockPart::Inode => write!(f, "{}", self.path),
            BlockPart::Indirect => write!(f, "{}:indirect", self.path),
            BlockPart::Data(block) => write!(f, "{}:{}", self.path, block),
        }
    }
}

/// Versioned blocks on top of the overlay.
///
/// Each write stores the bytes under a new storage key and then points the
/// block's meta key at it; reads follow the same indirection.
pub struct VersionedStore {
    node: Arc<TapestryNode>,
    consistency: Arc<dyn Consistency>,
}

impl VersionedStore {
    pub fn new(node: Arc<TapestryNode>, consistency: Arc<dyn Consistency>) -> Self {
        Self { node, consistency }
    }

    /// Writes a new version of `block`; returns its storage key.
    ///
    /// The version it replaces is retired from whichever node wrote it.
    pub async fn put(&self, block: &BlockKey, bytes: Vec<u8>) -> Result<String> {
        let meta_key = block.meta_key();
        let storage_key = Uuid::new_v4().to_string();

        self.node.store(&storage_key, bytes).await?;

        let previous = self.consistency.get(&meta_key).await?;
        self.consistency.put(&meta_key, &storage_key).await?;
        debug!("{} now at version {}", block, storage_key);

        if let Some(previous) = previous
            && previous != storage_key
            && let Err(e) = self.node.retire(&previous).await
        {
            warn!("Could not drop superseded version {} of {}: {}", previous, block, e);
        }

        Ok(storage_key)
    }

    /// Reads the current version of `block`.
    pub async fn get(&self, block: &BlockKey) -> Result<Vec<u8>> {
        let storage_key = self
            .consistency
            .get(&block.meta_key())
            .await?
            .ok_or_else(|| OverlayError::NotFound(block.to_string()))?;

        self.node.fetch(&storage_key).await
    }

    pub async fn current_version(&self, block: &BlockKey) -> Result<Option<String>> {
        self.consistency.get(&block.meta_key()).await
    }
}
