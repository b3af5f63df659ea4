use std::collections::HashSet;
use tracing::{debug, warn};

use super::service::TapestryNode;
use crate::error::{OverlayError, Result};
use crate::identifier::{DIGITS, Id};
use crate::routing::types::Node;

/// Outcome of a root resolution: the root and every node visited on the way.
#[derive(Debug, Clone)]
pub struct Route {
    pub root: Node,
    /// Starts at the first node asked and ends at `root`.
    pub path: Vec<Node>,
}

impl Route {
    pub fn hops(&self) -> usize {
        self.path.len().saturating_sub(1)
    }
}

impl TapestryNode {
    /// Walks hop by hop from `start` to the root of `target`.
    ///
    /// A hop that cannot be reached is evicted here and at the node that
    /// offered it, and that node is asked again for its next-best candidate.
    pub async fn find_root(&self, start: &Node, target: Id) -> Result<Route> {
        let mut path = vec![start.clone()];
        let mut visited: HashSet<Id> = HashSet::from([start.id]);
        let mut failures = 0usize;

        loop {
            let Some(current) = path.last().cloned() else {
                return Err(OverlayError::RootUnreachable(target));
            };

            match self.peer(&current).find_root_hop(target).await {
                Ok((next, is_root)) => {
                    if is_root || next.id == current.id {
                        debug!("Root of {} is {} after {} hops", target, current.id, path.len() - 1);
                        return Ok(Route {
                            root: current,
                            path,
                        });
                    }
                    if visited.contains(&next.id) {
                        warn!("Routing loop toward {} at {}; stopping there", target, current.id);
                        return Ok(Route {
                            root: current,
                            path,
                        });
                    }
                    if path.len() > DIGITS {
                        return Err(OverlayError::RootUnreachable(target));
                    }

                    debug!("Hop {} -> {} toward {}", current.id, next.id, target);
                    visited.insert(next.id);
                    path.push(next);
                }
                Err(e) if e.is_transient() => {
                    failures += 1;
                    warn!("Hop {} failed while resolving {}: {}", current.addr, target, e);

                    path.pop();
                    visited.remove(&current.id);
                    self.remove_bad_nodes(std::slice::from_ref(&current));

                    if let Some(previous) = path.last()
                        && let Err(e) = self
                            .peer(previous)
                            .remove_bad_nodes(vec![current.clone()])
                            .await
                    {
                        debug!("Could not report {} to {}: {}", current.id, previous.id, e);
                    }

                    if failures > self.config.hop_retries {
                        return Err(OverlayError::RootUnreachable(target));
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Resolves the root of `target` starting from this node.
    pub async fn route(&self, target: Id) -> Result<Route> {
        let local = self.local.clone();
        self.find_root(&local, target).await
    }
}
