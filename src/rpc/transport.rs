use async_trait::async_trait;
use std::net::SocketAddr;

use super::protocol::{Request, Response};
use crate::error::{OverlayError, Result};
use crate::identifier::Id;
use crate::location::types::{LocationRecord, Locator, ReplicaKey};
use crate::routing::types::Node;

/// Delivers a request to the node at `addr` and waits (bounded) for its reply.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(&self, addr: SocketAddr, request: Request) -> Result<Response>;
}

/// Server side of the protocol: what a transport hands inbound requests to.
#[async_trait]
pub trait RpcHandler: Send + Sync {
    fn local_node(&self) -> &Node;

    async fn dispatch(&self, request: Request) -> Result<Response>;
}

/// Typed view of one remote node over a transport.
pub struct Peer<'a, T: Transport + ?Sized> {
    via: &'a T,
    addr: SocketAddr,
}

impl<'a, T: Transport + ?Sized> Peer<'a, T> {
    pub fn new(via: &'a T, node: &Node) -> Self {
        Self {
            via,
            addr: node.addr,
        }
    }

    pub fn at(via: &'a T, addr: SocketAddr) -> Self {
        Self { via, addr }
    }

    async fn call(&self, request: Request) -> Result<Response> {
        match self.via.call(self.addr, request).await? {
            Response::Error(message) => Err(OverlayError::Remote(message)),
            response => Ok(response),
        }
    }

    pub async fn ping(&self) -> Result<Node> {
        match self.call(Request::Ping).await? {
            Response::Pong { node } => Ok(node),
            _ => Err(OverlayError::UnexpectedResponse("Ping")),
        }
    }

    pub async fn find_root_hop(&self, target: Id) -> Result<(Node, bool)> {
        match self.call(Request::FindRootHop { target }).await? {
            Response::Hop { next, is_root } => Ok((next, is_root)),
            _ => Err(OverlayError::UnexpectedResponse("FindRootHop")),
        }
    }

    pub async fn notify_join(&self, node: Node, level: usize) -> Result<(bool, Vec<Node>)> {
        match self.call(Request::NotifyJoin { node, level }).await? {
            Response::Joined {
                accepted,
                neighbors,
            } => Ok((accepted, neighbors)),
            _ => Err(OverlayError::UnexpectedResponse("NotifyJoin")),
        }
    }

    pub async fn notify_leave(&self, node: Node, replacement: Option<Node>) -> Result<()> {
        self.expect_ack(Request::NotifyLeave { node, replacement }, "NotifyLeave")
            .await
    }

    pub async fn add_backpointer(&self, node: Node) -> Result<()> {
        self.expect_ack(Request::AddBackpointer { node }, "AddBackpointer")
            .await
    }

    pub async fn remove_backpointer(&self, node: Node) -> Result<()> {
        self.expect_ack(Request::RemoveBackpointer { node }, "RemoveBackpointer")
            .await
    }

    pub async fn get_backpointers(&self, from: Node, level: usize) -> Result<Vec<Node>> {
        match self.call(Request::GetBackpointers { from, level }).await? {
            Response::Nodes(nodes) => Ok(nodes),
            _ => Err(OverlayError::UnexpectedResponse("GetBackpointers")),
        }
    }

    pub async fn get_routing_table(&self, from: Node) -> Result<Vec<Node>> {
        match self.call(Request::GetRoutingTable { from }).await? {
            Response::Nodes(nodes) => Ok(nodes),
            _ => Err(OverlayError::UnexpectedResponse("GetRoutingTable")),
        }
    }

    pub async fn remove_bad_nodes(&self, nodes: Vec<Node>) -> Result<()> {
        self.expect_ack(Request::RemoveBadNodes { nodes }, "RemoveBadNodes")
            .await
    }

    /// Returns whether the receiver accepted the record as root.
    pub async fn store(&self, key: ReplicaKey, record: LocationRecord) -> Result<bool> {
        match self.call(Request::Store { key, record }).await? {
            Response::Stored { is_root } => Ok(is_root),
            _ => Err(OverlayError::UnexpectedResponse("Store")),
        }
    }

    pub async fn unstore(&self, key: ReplicaKey, publisher: Id) -> Result<()> {
        self.expect_ack(Request::Unstore { key, publisher }, "Unstore")
            .await
    }

    pub async fn fetch(&self, key: ReplicaKey) -> Result<(bool, Vec<Locator>)> {
        match self.call(Request::Fetch { key }).await? {
            Response::Records { is_root, locators } => Ok((is_root, locators)),
            _ => Err(OverlayError::UnexpectedResponse("Fetch")),
        }
    }

    pub async fn fetch_blob(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let request = Request::FetchBlob {
            key: key.to_string(),
        };
        match self.call(request).await? {
            Response::Blob(bytes) => Ok(bytes),
            _ => Err(OverlayError::UnexpectedResponse("FetchBlob")),
        }
    }

    pub async fn transfer(
        &self,
        from: Node,
        records: Vec<(ReplicaKey, Vec<LocationRecord>)>,
    ) -> Result<()> {
        self.expect_ack(Request::Transfer { from, records }, "Transfer")
            .await
    }

    /// Asks the holder of `key` to drop its payload and records.
    pub async fn discard(&self, key: &str) -> Result<()> {
        let request = Request::Discard {
            key: key.to_string(),
        };
        self.expect_ack(request, "Discard").await
    }

    /// Hands `bytes` over; the receiver becomes their holder and republishes them.
    pub async fn adopt(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let request = Request::Adopt {
            key: key.to_string(),
            bytes,
        };
        self.expect_ack(request, "Adopt").await
    }

    async fn expect_ack(&self, request: Request, name: &'static str) -> Result<()> {
        match self.call(request).await? {
            Response::Ack => Ok(()),
            _ => Err(OverlayError::UnexpectedResponse(name)),
        }
    }
}
