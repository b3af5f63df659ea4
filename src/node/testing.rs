//! In-memory meshes for tests.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use super::service::TapestryNode;
use crate::config::OverlayConfig;
use crate::error::Result;
use crate::identifier::{BASE, DIGITS, Id};
use crate::routing::types::Node;
use crate::rpc::memory::MemoryNetwork;
use crate::rpc::transport::Transport;

pub(crate) const TEST_TIMEOUT: Duration = Duration::from_millis(500);

pub(crate) fn test_config() -> OverlayConfig {
    OverlayConfig {
        rpc_timeout: TEST_TIMEOUT,
        ..OverlayConfig::default()
    }
}

pub(crate) struct Mesh {
    pub network: Arc<MemoryNetwork>,
    pub nodes: Vec<Arc<TapestryNode>>,
    config: OverlayConfig,
}

impl Mesh {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: OverlayConfig) -> Self {
        Self {
            network: MemoryNetwork::new(config.rpc_timeout),
            nodes: Vec::new(),
            config,
        }
    }

    /// A registered node that has not joined anything yet.
    pub fn spawn(&self, id: Id) -> Arc<TapestryNode> {
        let transport: Arc<dyn Transport> = self.network.clone();
        let node = TapestryNode::new(
            Node::new(id, self.network.next_addr()),
            self.config.clone(),
            transport,
        );
        self.network.register(&node);
        node
    }

    /// Spawns a node and joins it through the first member, if any.
    pub async fn add(&mut self, id: Id) -> Result<Arc<TapestryNode>> {
        let node = self.spawn(id);
        if let Some(gateway) = self.nodes.first() {
            node.join(gateway.local_node()).await?;
        }
        self.nodes.push(node.clone());
        Ok(node)
    }

    pub fn get(&self, id: &Id) -> Arc<TapestryNode> {
        self.nodes
            .iter()
            .find(|n| n.id() == *id)
            .cloned()
            .expect("node in mesh")
    }

    /// Removes a node without telling anyone.
    pub fn crash(&mut self, id: &Id) -> Arc<TapestryNode> {
        let node = self.get(id);
        self.network.unregister(&node.local_node().addr);
        self.nodes.retain(|n| n.id() != *id);
        node
    }

    pub async fn leave(&mut self, id: &Id) -> Arc<TapestryNode> {
        let node = self.get(id);
        node.leave().await.expect("leave");
        self.network.unregister(&node.local_node().addr);
        self.nodes.retain(|n| n.id() != *id);
        node
    }

    /// Root of `target` computed from global knowledge of the membership.
    pub fn expected_root(&self, target: &Id) -> Id {
        let ids: BTreeSet<Id> = self.nodes.iter().map(|n| n.id()).collect();
        surrogate_root(&ids, target)
    }
}

/// Narrows the id set level by level, taking the first populated digit at or
/// cyclically above the target's digit.
pub(crate) fn surrogate_root(ids: &BTreeSet<Id>, target: &Id) -> Id {
    let mut candidates: Vec<Id> = ids.iter().copied().collect();

    for level in 0..DIGITS {
        if candidates.len() <= 1 {
            break;
        }
        let wanted = target.digit_at(level) as usize;
        for step in 0..BASE {
            let digit = ((wanted + step) % BASE) as u8;
            let matching: Vec<Id> = candidates
                .iter()
                .copied()
                .filter(|id| id.digit_at(level) == digit)
                .collect();
            if !matching.is_empty() {
                candidates = matching;
                break;
            }
        }
    }

    candidates[0]
}
