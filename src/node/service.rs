use async_trait::async_trait;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use crate::config::OverlayConfig;
use crate::error::{OverlayError, Result};
use crate::identifier::Id;
use crate::location::store::{BlobStore, RecordStore};
use crate::location::types::Locator;
use crate::routing::backpointers::Backpointers;
use crate::routing::table::RoutingTable;
use crate::routing::types::{Cell, Node};
use crate::rpc::protocol::{CellSnapshot, Request, Response, TableSnapshot};
use crate::rpc::transport::{Peer, RpcHandler, Transport};

/// One participant of the mesh.
///
/// Owns its routing table, backpointers and location state; every piece is
/// internally synchronized, so inbound handlers and outbound resolutions run
/// concurrently on a shared `Arc<TapestryNode>`.
pub struct TapestryNode {
    pub(crate) local: Node,
    pub(crate) config: OverlayConfig,
    pub(crate) table: RoutingTable,
    pub(crate) backpointers: Backpointers,
    pub(crate) records: RecordStore,
    pub(crate) blobs: BlobStore,
    /// Keys this node publishes and re-announces every republish round.
    pub(crate) published: DashMap<String, Locator>,
    transport: Arc<dyn Transport>,
    stopped: AtomicBool,
}

impl TapestryNode {
    pub fn new(local: Node, config: OverlayConfig, transport: Arc<dyn Transport>) -> Arc<Self> {
        info!("Created node {} at {}", local.id, local.addr);

        Arc::new(Self {
            table: RoutingTable::new(local.clone()),
            backpointers: Backpointers::new(local.clone()),
            records: RecordStore::new(config.record_ttl),
            blobs: BlobStore::new(),
            published: DashMap::new(),
            local,
            config,
            transport,
            stopped: AtomicBool::new(false),
        })
    }

    pub fn local_node(&self) -> &Node {
        &self.local
    }

    pub fn id(&self) -> Id {
        self.local.id
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    pub fn backpointers(&self) -> &Backpointers {
        &self.backpointers
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Marks the node as gone; returns `false` if it already was.
    pub(crate) fn stop(&self) -> bool {
        !self.stopped.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn peer<'a>(&'a self, node: &Node) -> Peer<'a, Self> {
        Peer::new(self, node)
    }

    /// Learns the identity of whoever listens at `addr`.
    pub async fn discover(&self, addr: SocketAddr) -> Result<Node> {
        Peer::at(self, addr).ping().await
    }

    /// Offers `node` to the routing table and keeps backpointers in step.
    pub(crate) async fn add_route(&self, node: Node) -> bool {
        let outcome = self.table.add(node.clone());

        if outcome.added {
            debug!("{}: added {} to routing table", self.local.id, node.id);
            if let Err(e) = self.peer(&node).add_backpointer(self.local.clone()).await {
                warn!("Failed to register backpointer at {}: {}", node.addr, e);
            }
        }

        if let Some(evicted) = outcome.evicted {
            debug!("{}: {} evicted by a closer node", self.local.id, evicted.id);
            if let Err(e) = self
                .peer(&evicted)
                .remove_backpointer(self.local.clone())
                .await
            {
                warn!("Failed to drop backpointer at {}: {}", evicted.addr, e);
            }
        }

        outcome.added
    }

    /// Forgets nodes found unreachable. Their cells stay empty until repaired.
    pub(crate) fn remove_bad_nodes(&self, nodes: &[Node]) {
        for node in nodes {
            if node.id == self.local.id {
                continue;
            }
            if self.table.remove(&node.id) {
                warn!("{}: evicted unreachable node {} ({})", self.local.id, node.id, node.addr);
            }
            self.backpointers.remove(&node.id);
        }
    }

    pub fn snapshot(&self) -> TableSnapshot {
        let mut cells: Vec<CellSnapshot> = Vec::new();
        for node in self.table.nodes() {
            let Some(cell) = Cell::of(&self.local.id, &node.id) else {
                continue;
            };
            match cells.last_mut() {
                Some(last) if last.cell == cell => last.nodes.push(node),
                _ => cells.push(CellSnapshot {
                    cell,
                    nodes: vec![node],
                }),
            }
        }

        TableSnapshot {
            local: self.local.clone(),
            cells,
            backpointers: self
                .backpointers
                .all()
                .into_iter()
                .map(|(_, node)| node)
                .collect(),
            root_records: self.records.record_count(),
            local_blobs: self.blobs.len(),
        }
    }
}

#[async_trait]
impl Transport for TapestryNode {
    /// Calls addressed to this node are served in-process.
    async fn call(&self, addr: SocketAddr, request: Request) -> Result<Response> {
        if addr == self.local.addr {
            return match self.dispatch(request).await {
                Ok(response) => Ok(response),
                Err(OverlayError::NodeStopped) => Err(OverlayError::NodeStopped),
                Err(e) => Ok(Response::Error(e.to_string())),
            };
        }
        self.transport.call(addr, request).await
    }
}

#[async_trait]
impl RpcHandler for TapestryNode {
    fn local_node(&self) -> &Node {
        &self.local
    }

    async fn dispatch(&self, request: Request) -> Result<Response> {
        if self.is_stopped() {
            return Err(OverlayError::NodeStopped);
        }

        match request {
            Request::Ping => Ok(Response::Pong {
                node: self.local.clone(),
            }),

            Request::FindRootHop { target } => {
                let next = self.table.next_hop(&target);
                let is_root = next.id == self.local.id;
                Ok(Response::Hop { next, is_root })
            }

            Request::NotifyJoin { node, level } => {
                let (accepted, neighbors) = self.handle_notify_join(node, level).await?;
                Ok(Response::Joined {
                    accepted,
                    neighbors,
                })
            }

            Request::NotifyLeave { node, replacement } => {
                self.handle_notify_leave(node, replacement).await;
                Ok(Response::Ack)
            }

            Request::AddBackpointer { node } => {
                if self.backpointers.add(node.clone()) {
                    debug!("{}: backpointer from {}", self.local.id, node.id);
                }
                // A referrer shares our prefix, so it may fill one of our own cells.
                self.add_route(node).await;
                Ok(Response::Ack)
            }

            Request::RemoveBackpointer { node } => {
                self.backpointers.remove(&node.id);
                Ok(Response::Ack)
            }

            Request::GetBackpointers { from, level } => {
                let nodes = self.backpointers.get(level);
                self.add_route(from).await;
                Ok(Response::Nodes(nodes))
            }

            Request::GetRoutingTable { from } => {
                debug!("{}: routing table requested by {}", self.local.id, from.id);
                Ok(Response::Nodes(self.table.nodes()))
            }

            Request::RemoveBadNodes { nodes } => {
                self.remove_bad_nodes(&nodes);
                Ok(Response::Ack)
            }

            Request::Store { key, record } => Ok(Response::Stored {
                is_root: self.handle_store(key, record),
            }),

            Request::Unstore { key, publisher } => {
                self.records.remove(&key, &publisher);
                Ok(Response::Ack)
            }

            Request::Fetch { key } => {
                let (is_root, locators) = self.handle_fetch(&key);
                Ok(Response::Records { is_root, locators })
            }

            Request::FetchBlob { key } => Ok(Response::Blob(self.blobs.get(&key))),

            Request::Transfer { from, records } => {
                self.handle_transfer(from, records);
                Ok(Response::Ack)
            }

            Request::Discard { key } => {
                self.remove(&key).await?;
                Ok(Response::Ack)
            }

            Request::Adopt { key, bytes } => {
                self.store(&key, bytes).await?;
                Ok(Response::Ack)
            }
        }
    }
}
