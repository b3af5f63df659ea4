use dashmap::DashMap;
use std::time::{Duration, Instant};

use super::types::{LocationRecord, Locator, ReplicaKey};
use crate::identifier::Id;

#[derive(Debug, Clone)]
struct StoredRecord {
    record: LocationRecord,
    expires_at: Instant,
}

/// Location records held by a node in its role as root.
///
/// At most one record per `(key, publisher)`; publishing again refreshes it.
pub struct RecordStore {
    entries: DashMap<ReplicaKey, Vec<StoredRecord>>,
    ttl: Duration,
}

impl RecordStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn insert(&self, key: ReplicaKey, record: LocationRecord) {
        let expires_at = Instant::now() + self.ttl;
        let mut records = self.entries.entry(key).or_default();

        match records
            .iter_mut()
            .find(|r| r.record.publisher == record.publisher)
        {
            Some(existing) => {
                existing.record = record;
                existing.expires_at = expires_at;
            }
            None => records.push(StoredRecord { record, expires_at }),
        }
    }

    /// Drops the record `publisher` made for `key`; absent records are fine.
    pub fn remove(&self, key: &ReplicaKey, publisher: &Id) -> bool {
        let removed = match self.entries.get_mut(key) {
            Some(mut records) => {
                let before = records.len();
                records.retain(|r| r.record.publisher != *publisher);
                records.len() != before
            }
            None => false,
        };

        self.entries.remove_if(key, |_, records| records.is_empty());
        removed
    }

    pub fn get(&self, key: &ReplicaKey) -> Vec<Locator> {
        let now = Instant::now();
        self.entries
            .get(key)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.expires_at > now)
                    .map(|r| r.record.locator.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Removes records not refreshed within the TTL; returns how many went.
    pub fn expire(&self) -> usize {
        let now = Instant::now();
        let mut expired = 0;

        for mut entry in self.entries.iter_mut() {
            let before = entry.value().len();
            entry.value_mut().retain(|r| r.expires_at > now);
            expired += before - entry.value().len();
        }

        self.entries.retain(|_, records| !records.is_empty());
        expired
    }

    /// Removes and returns every record group whose key satisfies `belongs`.
    pub fn take_where<F>(&self, belongs: F) -> Vec<(ReplicaKey, Vec<LocationRecord>)>
    where
        F: Fn(&ReplicaKey) -> bool,
    {
        let keys: Vec<ReplicaKey> = self
            .entries
            .iter()
            .filter(|entry| belongs(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();

        keys.into_iter()
            .filter_map(|key| self.entries.remove(&key))
            .map(|(key, records)| (key, records.into_iter().map(|r| r.record).collect()))
            .collect()
    }

    pub fn drain(&self) -> Vec<(ReplicaKey, Vec<LocationRecord>)> {
        self.take_where(|_| true)
    }

    pub fn key_count(&self) -> usize {
        self.entries.len()
    }

    pub fn record_count(&self) -> usize {
        self.entries.iter().map(|entry| entry.value().len()).sum()
    }
}

/// Payloads this node keeps on behalf of its own `store` calls.
#[derive(Default)]
pub struct BlobStore {
    blobs: DashMap<String, Vec<u8>>,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: &str, bytes: Vec<u8>) {
        self.blobs.insert(key.to_string(), bytes);
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs.get(key).map(|bytes| bytes.clone())
    }

    pub fn remove(&self, key: &str) -> bool {
        self.blobs.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    pub fn clear(&self) {
        self.blobs.clear();
    }
}
