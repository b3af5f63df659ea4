use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::types::{LocationRecord, Locator, ReplicaKey};
use crate::error::{OverlayError, Result};
use crate::identifier::Id;
use crate::node::TapestryNode;
use crate::routing::types::Node;

impl TapestryNode {
    // --- Root-side handlers ---

    /// Keeps `record` if this node is the root of `key`.
    pub(crate) fn handle_store(&self, key: ReplicaKey, record: LocationRecord) -> bool {
        let next = self.table.next_hop(&key.id());
        if next.id != self.local.id {
            debug!("{} is not root of {:?}; next hop is {}", self.local.id, key, next.id);
            return false;
        }
        self.records.insert(key, record);
        true
    }

    /// Locators held for `key`, returned even when this node is no longer its root.
    pub(crate) fn handle_fetch(&self, key: &ReplicaKey) -> (bool, Vec<Locator>) {
        let is_root = self.table.next_hop(&key.id()).id == self.local.id;
        (is_root, self.records.get(key))
    }

    pub(crate) fn handle_transfer(&self, from: Node, records: Vec<(ReplicaKey, Vec<LocationRecord>)>) {
        let count: usize = records.iter().map(|(_, group)| group.len()).sum();
        self.restore_records(records);
        info!("{} took over {} records from {}", self.local.id, count, from.id);
    }

    // --- Publishing ---

    /// Announces `locator` under every replica of `key` and remembers it for republish.
    ///
    /// Returns the number of replicas stored; fails only when none was.
    pub async fn publish(&self, key: &str, locator: Locator) -> Result<usize> {
        self.published.insert(key.to_string(), locator.clone());
        self.publish_replicas(key, locator).await
    }

    /// Publishes the bytes themselves rather than a pointer to this node.
    pub async fn publish_value(&self, key: &str, bytes: Vec<u8>) -> Result<usize> {
        self.publish(key, Locator::Value(bytes)).await
    }

    pub(crate) async fn publish_replicas(&self, key: &str, locator: Locator) -> Result<usize> {
        let record = LocationRecord {
            locator,
            publisher: self.local.id,
        };

        let mut stored = 0;
        let mut last_error = None;

        for replica in 0..self.config.replicas {
            let replica_key = ReplicaKey::new(key, replica);
            match self.store_at_root(&replica_key, &record).await {
                Ok(root) => {
                    debug!("Stored {:?} at {}", replica_key, root.id);
                    stored += 1;
                }
                Err(e) => {
                    warn!("Failed to publish {:?}: {}", replica_key, e);
                    last_error = Some(e);
                }
            }
        }

        if stored == 0 {
            return Err(last_error.unwrap_or_else(|| OverlayError::NotFound(key.to_string())));
        }
        Ok(stored)
    }

    /// Sends `record` to the root of `key`, re-resolving while the receiver
    /// reports it is not (or no longer) the root.
    async fn store_at_root(&self, key: &ReplicaKey, record: &LocationRecord) -> Result<Node> {
        let target = key.id();

        for _ in 0..=self.config.hop_retries {
            let route = self.route(target).await?;
            match self.peer(&route.root).store(key.clone(), record.clone()).await {
                Ok(true) => return Ok(route.root),
                Ok(false) => debug!("{} declined {:?}; resolving again", route.root.id, key),
                Err(e) if e.is_transient() => {
                    warn!("Root {} of {:?} unreachable: {}", route.root.addr, key, e);
                    self.remove_bad_nodes(std::slice::from_ref(&route.root));
                }
                Err(e) => return Err(e),
            }
        }

        Err(OverlayError::RootUnreachable(target))
    }

    /// Withdraws this node's records for `key`. Safe to repeat.
    ///
    /// Fails only when no replica root confirmed the withdrawal.
    pub async fn unpublish(&self, key: &str) -> Result<()> {
        self.published.remove(key);

        let mut confirmed = 0;
        let mut last_error = None;

        for replica in 0..self.config.replicas {
            let replica_key = ReplicaKey::new(key, replica);
            let route = match self.route(replica_key.id()).await {
                Ok(route) => route,
                Err(e) => {
                    warn!("Cannot resolve root of {:?} to unpublish: {}", replica_key, e);
                    last_error = Some(e);
                    continue;
                }
            };
            match self
                .peer(&route.root)
                .unstore(replica_key.clone(), self.local.id)
                .await
            {
                Ok(()) => confirmed += 1,
                Err(e) => {
                    warn!("Unpublish of {:?} at {} failed: {}", replica_key, route.root.id, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if confirmed == 0 => Err(e),
            _ => Ok(()),
        }
    }

    // --- Lookup ---

    /// Finds where `key` lives, trying replicas in order.
    pub async fn locate(&self, key: &str) -> Result<Vec<Locator>> {
        for replica in 0..self.config.replicas {
            let replica_key = ReplicaKey::new(key, replica);
            match self.fetch_from_root(&replica_key).await {
                Ok(locators) if !locators.is_empty() => return Ok(locators),
                Ok(_) => debug!("Replica {:?} has no records", replica_key),
                Err(e) => debug!("Replica {:?} lookup failed: {}", replica_key, e),
            }
        }
        Err(OverlayError::NotFound(key.to_string()))
    }

    async fn fetch_from_root(&self, key: &ReplicaKey) -> Result<Vec<Locator>> {
        let target = key.id();

        for _ in 0..=self.config.hop_retries {
            let route = self.route(target).await?;
            match self.peer(&route.root).fetch(key.clone()).await {
                Ok((is_root, locators)) if is_root || !locators.is_empty() => return Ok(locators),
                Ok(_) => debug!("{} stopped being root of {:?}; resolving again", route.root.id, key),
                Err(e) if e.is_transient() => {
                    warn!("Root {} of {:?} unreachable: {}", route.root.addr, key, e);
                    self.remove_bad_nodes(std::slice::from_ref(&route.root));
                }
                Err(e) => return Err(e),
            }
        }

        Err(OverlayError::RootUnreachable(target))
    }

    // --- Filesystem contract ---

    /// Keeps `bytes` locally and advertises this node as their holder.
    pub async fn store(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.blobs.insert(key, bytes);
        self.publish(key, Locator::Holder(self.local.clone())).await?;
        Ok(())
    }

    pub async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        if let Some(bytes) = self.blobs.get(key) {
            return Ok(bytes);
        }

        for locator in self.locate(key).await? {
            match locator {
                Locator::Value(bytes) => return Ok(bytes),
                Locator::Holder(holder) if holder.id == self.local.id => continue,
                Locator::Holder(holder) => match self.peer(&holder).fetch_blob(key).await {
                    Ok(Some(bytes)) => return Ok(bytes),
                    Ok(None) => debug!("Holder {} no longer has {}", holder.id, key),
                    Err(e) => warn!("Holder {} of {} failed: {}", holder.addr, key, e),
                },
            }
        }

        Err(OverlayError::NotFound(key.to_string()))
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        self.blobs.remove(key);
        self.unpublish(key).await
    }

    // --- Migration ---

    /// Hands `node` the records whose next hop from here is now `node`.
    pub(crate) async fn transfer_records_to(&self, node: &Node) {
        if node.id == self.local.id {
            return;
        }

        let moving = self
            .records
            .take_where(|key| self.table.next_hop(&key.id()).id == node.id);
        if moving.is_empty() {
            return;
        }

        info!("{} transferring {} record keys to {}", self.local.id, moving.len(), node.id);
        if let Err(e) = self
            .peer(node)
            .transfer(self.local.clone(), moving.clone())
            .await
        {
            warn!("Transfer to {} failed, keeping records: {}", node.addr, e);
            self.restore_records(moving);
        }
    }

    /// Moves every record held here to the root the rest of the mesh now sees.
    pub(crate) async fn migrate_records(&self) {
        let held = self.records.drain();
        if held.is_empty() {
            return;
        }

        let survivors = self.table.nodes();
        let mut by_root: HashMap<Id, (Node, Vec<(ReplicaKey, Vec<LocationRecord>)>)> =
            HashMap::new();

        for (key, group) in held {
            let mut placed = false;
            for start in &survivors {
                match self.find_root(start, key.id()).await {
                    Ok(route) if route.root.id != self.local.id => {
                        by_root
                            .entry(route.root.id)
                            .or_insert_with(|| (route.root.clone(), Vec::new()))
                            .1
                            .push((key.clone(), group.clone()));
                        placed = true;
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => debug!("Resolution of {:?} from {} failed: {}", key, start.id, e),
                }
            }
            if !placed {
                warn!("No surviving root for {:?}; dropping its records", key);
            }
        }

        for (root, records) in by_root.into_values() {
            let count = records.len();
            match self.peer(&root).transfer(self.local.clone(), records).await {
                Ok(()) => info!("Migrated {} record keys to {}", count, root.id),
                Err(e) => warn!("Migration to {} failed: {}", root.addr, e),
            }
        }
    }

    /// Passes every payload this node holds to its closest live neighbour,
    /// which becomes the holder and keeps republishing it.
    pub(crate) async fn hand_off_blobs(&self) {
        let held: Vec<String> = self
            .published
            .iter()
            .filter(|entry| matches!(entry.value(), Locator::Holder(n) if n.id == self.local.id))
            .map(|entry| entry.key().clone())
            .collect();
        if held.is_empty() {
            return;
        }

        let mut heirs = self.table.nodes();
        heirs.sort_by_key(|node| self.local.id.distance(&node.id));

        for key in held {
            let Some(bytes) = self.blobs.get(&key) else {
                continue;
            };

            let mut adopted = false;
            for heir in &heirs {
                match self.peer(heir).adopt(&key, bytes.clone()).await {
                    Ok(()) => {
                        info!("{} handed {} to {}", self.local.id, key, heir.id);
                        adopted = true;
                        break;
                    }
                    Err(e) => warn!("{} could not adopt {}: {}", heir.addr, key, e),
                }
            }

            if !adopted {
                warn!("No neighbour took {} before leaving; its data goes with this node", key);
                continue;
            }
            if let Err(e) = self.unpublish(&key).await {
                debug!("Old records of {} left to expire: {}", key, e);
            }
        }
    }

    /// Retires `key` everywhere: drops the local copy, then asks every other
    /// holder the mesh knows of to discard theirs.
    ///
    /// Returns the number of remote holders that confirmed.
    pub async fn retire(&self, key: &str) -> Result<usize> {
        self.remove(key).await?;

        let locators = match self.locate(key).await {
            Ok(locators) => locators,
            Err(OverlayError::NotFound(_)) => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut discarded = 0;
        for locator in locators {
            let Locator::Holder(holder) = locator else {
                continue;
            };
            if holder.id == self.local.id {
                continue;
            }
            match self.peer(&holder).discard(key).await {
                Ok(()) => discarded += 1,
                Err(e) => warn!("Holder {} kept {}: {}", holder.addr, key, e),
            }
        }
        Ok(discarded)
    }

    fn restore_records(&self, records: Vec<(ReplicaKey, Vec<LocationRecord>)>) {
        for (key, group) in records {
            for record in group {
                self.records.insert(key.clone(), record);
            }
        }
    }
}
