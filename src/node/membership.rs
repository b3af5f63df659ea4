use std::collections::HashSet;
use std::net::SocketAddr;
use tracing::{debug, info, warn};

use super::service::TapestryNode;
use crate::error::{OverlayError, Result};
use crate::identifier::{BASE, DIGITS, Id};
use crate::routing::table::SLOT_SIZE;
use crate::routing::types::{Cell, Node};

impl TapestryNode {
    /// Joins the mesh through the node listening at `addr`.
    pub async fn join_via(&self, addr: SocketAddr) -> Result<()> {
        let gateway = self.discover(addr).await?;
        self.join(&gateway).await
    }

    /// Inserts this node into the mesh `gateway` belongs to.
    pub async fn join(&self, gateway: &Node) -> Result<()> {
        info!("{} joining via {} ({})", self.local.id, gateway.id, gateway.addr);

        let route = self.find_root(gateway, self.local.id).await?;
        if route.root.id == self.local.id {
            return Err(OverlayError::IdInUse(self.local.id));
        }

        for hop in &route.path {
            self.add_route(hop.clone()).await;
            match self.peer(hop).get_routing_table(self.local.clone()).await {
                Ok(entries) => {
                    for entry in entries {
                        if entry.id != self.local.id {
                            self.add_route(entry).await;
                        }
                    }
                }
                Err(e) => warn!("Could not copy routing table of {}: {}", hop.addr, e),
            }
        }

        let level = self.local.id.shared_prefix_len(&route.root.id);
        let (accepted, neighbors) = self
            .peer(&route.root)
            .notify_join(self.local.clone(), level)
            .await?;
        if !accepted {
            warn!("No node accepted {} into its routing table", self.local.id);
        }

        let neighbors: Vec<Node> = unique(neighbors)
            .into_iter()
            .filter(|n| n.id != self.local.id)
            .collect();
        for neighbor in &neighbors {
            self.add_route(neighbor.clone()).await;
        }

        self.traverse_backpointers(neighbors, level).await;

        info!(
            "{} joined under root {} with {} routing entries",
            self.local.id,
            route.root.id,
            self.table.len()
        );
        Ok(())
    }

    /// Multicast step for a joining `node`, covering rows `level..` of this table.
    ///
    /// Returns whether the node was accepted anywhere below this point and every
    /// node that saw the announcement.
    pub(crate) async fn handle_notify_join(
        &self,
        node: Node,
        level: usize,
    ) -> Result<(bool, Vec<Node>)> {
        if level >= DIGITS {
            if node.id == self.local.id {
                return Ok((false, Vec::new()));
            }
            let added = self.add_route(node.clone()).await;
            let accepted = added || self.table.contains(&node.id);
            self.transfer_records_to(&node).await;
            return Ok((accepted, vec![self.local.clone()]));
        }

        let mut accepted = false;
        let mut neighbors = Vec::new();
        let own = self.local.id.digit_at(level);

        for digit in 0..BASE as u8 {
            if digit == own {
                continue;
            }
            for candidate in self.table.slot(Cell { level, digit }) {
                if candidate.id == node.id {
                    continue;
                }
                match self.peer(&candidate).notify_join(node.clone(), level + 1).await {
                    Ok((ok, seen)) => {
                        accepted |= ok;
                        neighbors.extend(seen);
                        break;
                    }
                    Err(e) if e.is_transient() => {
                        warn!("Join notification to {} failed: {}", candidate.addr, e);
                        self.remove_bad_nodes(std::slice::from_ref(&candidate));
                    }
                    Err(e) => {
                        warn!("Join notification to {} rejected: {}", candidate.addr, e);
                        break;
                    }
                }
            }
        }

        let (ok, seen) = self
            .peer(&self.local)
            .notify_join(node, level + 1)
            .await?;
        accepted |= ok;
        neighbors.extend(seen);

        Ok((accepted, unique(neighbors)))
    }

    /// Fills the lower rows of a fresh table from the backpointers of its neighbours.
    ///
    /// Each round asks the current neighbour set for backpointers one level
    /// lower and keeps the `SLOT_SIZE * BASE` nodes closest to this one.
    pub(crate) async fn traverse_backpointers(&self, neighbors: Vec<Node>, from_level: usize) {
        let mut current = neighbors;

        for level in (0..=from_level.min(DIGITS - 1)).rev() {
            let mut next = current.clone();

            for neighbor in &current {
                match self
                    .peer(neighbor)
                    .get_backpointers(self.local.clone(), level)
                    .await
                {
                    Ok(found) => {
                        for node in found {
                            if node.id != self.local.id {
                                self.add_route(node.clone()).await;
                                next.push(node);
                            }
                        }
                    }
                    Err(e) if e.is_transient() => {
                        warn!("Backpointer request to {} failed: {}", neighbor.addr, e);
                        self.remove_bad_nodes(std::slice::from_ref(neighbor));
                    }
                    Err(e) => warn!("Backpointer request to {} rejected: {}", neighbor.addr, e),
                }
            }

            let local_id = self.local.id;
            let mut next = unique(next);
            next.sort_by_key(|n| n.id.distance(&local_id));
            next.truncate(SLOT_SIZE * BASE);
            debug!("Backpointer traversal at level {} keeps {} nodes", level, next.len());
            current = next;
        }
    }

    /// `node` is leaving; drop it and adopt `replacement` if one was offered.
    pub(crate) async fn handle_notify_leave(&self, node: Node, replacement: Option<Node>) {
        if self.table.remove(&node.id) {
            info!("{}: {} left the mesh", self.local.id, node.id);
        }
        self.backpointers.remove(&node.id);

        if let Some(replacement) = replacement
            && replacement.id != self.local.id
            && replacement.id != node.id
        {
            self.add_route(replacement).await;
        }
    }

    /// Leaves the mesh gracefully. Calling it again is a no-op.
    ///
    /// Payloads this node holds are first handed to a neighbour so they
    /// outlive it; then every node referencing it is notified, its own references are
    /// withdrawn and the records it keeps as root are handed to their new roots.
    pub async fn leave(&self) -> Result<()> {
        if self.is_stopped() {
            return Ok(());
        }
        info!("{} leaving the mesh", self.local.id);

        self.hand_off_blobs().await;

        if !self.stop() {
            return Ok(());
        }

        for (level, backpointer) in self.backpointers.all() {
            let replacement = self.table.replacement_for(level);
            if let Err(e) = self
                .peer(&backpointer)
                .notify_leave(self.local.clone(), replacement)
                .await
            {
                warn!("Leave notification to {} failed: {}", backpointer.addr, e);
            }
        }

        for neighbor in self.table.nodes() {
            if let Err(e) = self
                .peer(&neighbor)
                .remove_backpointer(self.local.clone())
                .await
            {
                debug!("Could not withdraw backpointer at {}: {}", neighbor.addr, e);
            }
        }

        self.migrate_records().await;

        self.table.clear();
        self.backpointers.clear();
        self.records.drain();
        self.blobs.clear();
        self.published.clear();

        info!("{} left the mesh", self.local.id);
        Ok(())
    }
}

/// Removes repeated nodes, keeping first occurrences in order.
fn unique(nodes: Vec<Node>) -> Vec<Node> {
    let mut seen: HashSet<Id> = HashSet::new();
    nodes.into_iter().filter(|n| seen.insert(n.id)).collect()
}
