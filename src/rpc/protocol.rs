//! Peer Network Protocol
//!
//! The closed set of operations a node answers for its peers, and the DTOs of
//! the node's HTTP surface.
//!
//! Peer calls travel as a bincode-encoded [`Envelope`] in the body of a POST to
//! [`ENDPOINT_RPC`]; the reply body is a bincode-encoded [`Response`].

use serde::{Deserialize, Serialize};

use crate::identifier::Id;
use crate::location::types::{LocationRecord, Locator, ReplicaKey};
use crate::routing::types::{Cell, Node};

// --- API Endpoints ---

/// Peer-to-peer RPC endpoint.
pub const ENDPOINT_RPC: &str = "/rpc";
/// Public object endpoint (`PUT`, `GET`, `DELETE` on `/object/{key}`).
pub const ENDPOINT_OBJECT: &str = "/object";
/// Debug dump of the routing table and backpointers.
pub const ENDPOINT_TABLE: &str = "/table";

/// Bumped whenever a variant of [`Request`] or [`Response`] changes shape.
pub const PROTOCOL_VERSION: u16 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub version: u16,
    pub request: Request,
}

impl Envelope {
    pub fn new(request: Request) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            request,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    /// Liveness probe; also how a bootstrapping node learns a seed's identity.
    Ping,

    /// One step of root resolution toward `target`.
    FindRootHop { target: Id },

    /// Acknowledged multicast announcing `node` to every node sharing its
    /// prefix, continuing from row `level` of the receiver's table.
    NotifyJoin { node: Node, level: usize },

    /// `node` is leaving; `replacement` may take its place in the receiver's table.
    NotifyLeave {
        node: Node,
        replacement: Option<Node>,
    },

    /// The sender now keeps `node` (the receiver) in its table.
    AddBackpointer { node: Node },

    /// The sender no longer keeps the receiver in its table.
    RemoveBackpointer { node: Node },

    /// The receiver's backpointers at `level`.
    GetBackpointers { from: Node, level: usize },

    /// Every entry of the receiver's routing table.
    GetRoutingTable { from: Node },

    /// Evict nodes the sender found unreachable.
    RemoveBadNodes { nodes: Vec<Node> },

    /// Remember `record` for `key` if the receiver is its root.
    Store {
        key: ReplicaKey,
        record: LocationRecord,
    },

    /// Forget the record `publisher` made for `key`.
    Unstore { key: ReplicaKey, publisher: Id },

    /// The locators the receiver holds for `key`, if it is its root.
    Fetch { key: ReplicaKey },

    /// Payload the receiver keeps in its blob store.
    FetchBlob { key: String },

    /// Records handed over by a node that is no longer their root.
    Transfer {
        from: Node,
        records: Vec<(ReplicaKey, Vec<LocationRecord>)>,
    },

    /// Drop the receiver's payload for `key` and withdraw its records.
    Discard { key: String },

    /// Keep `bytes` under `key` and publish the receiver as their holder.
    Adopt { key: String, bytes: Vec<u8> },
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Request::Ping => "Ping",
            Request::FindRootHop { .. } => "FindRootHop",
            Request::NotifyJoin { .. } => "NotifyJoin",
            Request::NotifyLeave { .. } => "NotifyLeave",
            Request::AddBackpointer { .. } => "AddBackpointer",
            Request::RemoveBackpointer { .. } => "RemoveBackpointer",
            Request::GetBackpointers { .. } => "GetBackpointers",
            Request::GetRoutingTable { .. } => "GetRoutingTable",
            Request::RemoveBadNodes { .. } => "RemoveBadNodes",
            Request::Store { .. } => "Store",
            Request::Unstore { .. } => "Unstore",
            Request::Fetch { .. } => "Fetch",
            Request::FetchBlob { .. } => "FetchBlob",
            Request::Transfer { .. } => "Transfer",
            Request::Discard { .. } => "Discard",
            Request::Adopt { .. } => "Adopt",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Response {
    Pong { node: Node },
    Hop { next: Node, is_root: bool },
    Joined { accepted: bool, neighbors: Vec<Node> },
    Nodes(Vec<Node>),
    Stored { is_root: bool },
    Records { is_root: bool, locators: Vec<Locator> },
    Blob(Option<Vec<u8>>),
    Ack,
    /// The receiver failed to handle the request.
    Error(String),
}

// --- Data Transfer Objects ---

/// One populated routing table cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellSnapshot {
    pub cell: Cell,
    pub nodes: Vec<Node>,
}

/// JSON view of a node's routing state served on [`ENDPOINT_TABLE`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub local: Node,
    pub cells: Vec<CellSnapshot>,
    pub backpointers: Vec<Node>,
    pub root_records: usize,
    pub local_blobs: usize,
}

/// Standard acknowledgment for object writes and deletes.
#[derive(Debug, Serialize, Deserialize)]
pub struct ObjectResponse {
    pub success: bool,
    pub error: Option<String>,
}
