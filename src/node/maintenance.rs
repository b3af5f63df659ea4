use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::service::TapestryNode;
use crate::identifier::Id;
use crate::location::types::Locator;
use crate::routing::types::{Cell, Node};

const MIN_EXPIRY_PERIOD: Duration = Duration::from_millis(100);

impl TapestryNode {
    /// Pings every routing entry, evicts the ones that do not answer and
    /// refills their cells from what live neighbours know.
    ///
    /// Returns the number of evicted nodes.
    pub async fn probe_neighbors(&self) -> usize {
        let mut dead = Vec::new();

        for neighbor in self.table.nodes() {
            if let Err(e) = self.peer(&neighbor).ping().await
                && e.is_transient()
            {
                warn!("Neighbour {} ({}) failed probe: {}", neighbor.id, neighbor.addr, e);
                dead.push(neighbor);
            }
        }

        self.remove_bad_nodes(&dead);
        if !dead.is_empty() {
            let refilled = self.repair_cells(&dead).await;
            if refilled > 0 {
                info!("{} refilled {} routing entries", self.local.id, refilled);
            }
        }
        dead.len()
    }

    /// Offers the cells `dead` occupied every live node our neighbours and
    /// referrers know of. Returns how many were added.
    async fn repair_cells(&self, dead: &[Node]) -> usize {
        let gone: HashSet<Id> = dead.iter().map(|node| node.id).collect();
        let holes: HashSet<Cell> = dead
            .iter()
            .filter_map(|node| Cell::of(&self.local.id, &node.id))
            .collect();

        let mut sources = self.table.nodes();
        sources.extend(self.backpointers.all().into_iter().map(|(_, node)| node));

        let mut candidates = sources.clone();
        for source in &sources {
            match self.peer(source).get_routing_table(self.local.clone()).await {
                Ok(entries) => candidates.extend(entries),
                Err(e) => debug!("No table from {} during repair: {}", source.addr, e),
            }
        }

        let mut seen = HashSet::new();
        let mut refilled = 0;
        for candidate in candidates {
            if candidate.id == self.local.id
                || gone.contains(&candidate.id)
                || !seen.insert(candidate.id)
                || self.table.contains(&candidate.id)
            {
                continue;
            }
            let Some(cell) = Cell::of(&self.local.id, &candidate.id) else {
                continue;
            };
            if !holes.contains(&cell) {
                continue;
            }
            // Neighbours may still list nodes that crashed alongside the evicted ones.
            if self.peer(&candidate).ping().await.is_err() {
                continue;
            }
            if self.add_route(candidate).await {
                refilled += 1;
            }
        }
        refilled
    }

    /// Re-announces every key this node publishes.
    pub async fn republish(&self) -> usize {
        let keys: Vec<(String, Locator)> = self
            .published
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut refreshed = 0;
        for (key, locator) in keys {
            match self.publish_replicas(&key, locator).await {
                Ok(_) => refreshed += 1,
                Err(e) => warn!("Republish of {} failed: {}", key, e),
            }
        }
        refreshed
    }

    /// Drops root records whose publisher stopped refreshing them.
    pub fn expire_records(&self) -> usize {
        let expired = self.records.expire();
        if expired > 0 {
            debug!("{} expired {} location records", self.local.id, expired);
        }
        expired
    }

    /// Spawns the periodic probe, republish and expiry loops.
    ///
    /// Each loop ends on its own once the node has left.
    pub fn start_maintenance(self: Arc<Self>) {
        info!("Starting maintenance loops for {}", self.local.id);

        let _probe_handle = {
            let node = self.clone();
            tokio::spawn(async move {
                node.probe_loop().await;
            })
        };

        let _republish_handle = {
            let node = self.clone();
            tokio::spawn(async move {
                node.republish_loop().await;
            })
        };

        let _expiry_handle = {
            let node = self;
            tokio::spawn(async move {
                node.expiry_loop().await;
            })
        };
    }

    async fn probe_loop(&self) {
        let mut interval = tokio::time::interval(self.config.probe_interval);
        interval.tick().await;

        loop {
            interval.tick().await;
            if self.is_stopped() {
                break;
            }

            let evicted = self.probe_neighbors().await;
            if evicted > 0 {
                info!("Probe evicted {} neighbours", evicted);
            }
        }
    }

    async fn republish_loop(&self) {
        let mut interval = tokio::time::interval(self.config.republish_interval);
        interval.tick().await;

        loop {
            interval.tick().await;
            if self.is_stopped() {
                break;
            }

            let refreshed = self.republish().await;
            debug!("Republished {} keys", refreshed);
        }
    }

    async fn expiry_loop(&self) {
        let period = self
            .config
            .record_ttl
            .min(self.config.republish_interval)
            .max(MIN_EXPIRY_PERIOD);
        let mut interval = tokio::time::interval(period);

        loop {
            interval.tick().await;
            if self.is_stopped() {
                break;
            }
            self.expire_records();
        }
    }
}
