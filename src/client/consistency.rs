use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::Result;

/// Linearizable map from meta keys to the storage key of their current version.
#[async_trait]
pub trait Consistency: Send + Sync {
    async fn get(&self, meta_key: &str) -> Result<Option<String>>;

    async fn put(&self, meta_key: &str, storage_key: &str) -> Result<()>;
}

/// Process-local `Consistency`: a single map is trivially linearizable.
#[derive(Default)]
pub struct MemoryConsistency {
    entries: DashMap<String, String>,
}

impl MemoryConsistency {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Consistency for MemoryConsistency {
    async fn get(&self, meta_key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(meta_key).map(|entry| entry.value().clone()))
    }

    async fn put(&self, meta_key: &str, storage_key: &str) -> Result<()> {
        self.entries
            .insert(meta_key.to_string(), storage_key.to_string());
        Ok(())
    }
}
