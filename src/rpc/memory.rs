use async_trait::async_trait;
use dashmap::DashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use super::protocol::{Envelope, PROTOCOL_VERSION, Request, Response};
use super::transport::{RpcHandler, Transport};
use crate::error::{OverlayError, Result};

const FIRST_PORT: u16 = 20_000;

/// In-process network: nodes register under a synthetic address and calls are
/// delivered straight to their handler.
///
/// Requests and replies still go through the wire codec, and every call is
/// bounded by the same timeout a socket transport would use. Unregistering a
/// node makes it look crashed to everyone else.
pub struct MemoryNetwork {
    nodes: DashMap<SocketAddr, Weak<dyn RpcHandler>>,
    timeout: Duration,
    next_port: AtomicU16,
}

impl MemoryNetwork {
    pub fn new(timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            nodes: DashMap::new(),
            timeout,
            next_port: AtomicU16::new(FIRST_PORT),
        })
    }

    /// A fresh address no registered node uses.
    pub fn next_addr(&self) -> SocketAddr {
        let port = self.next_port.fetch_add(1, Ordering::Relaxed);
        SocketAddr::from((Ipv4Addr::LOCALHOST, port))
    }

    pub fn register<H>(&self, handler: &Arc<H>)
    where
        H: RpcHandler + 'static,
    {
        let addr = handler.local_node().addr;
        let strong: Arc<dyn RpcHandler> = handler.clone();
        self.nodes.insert(addr, Arc::downgrade(&strong));
        tracing::debug!("Registered {} on the in-memory network", addr);
    }

    /// Drops the node at `addr`; later calls to it fail as unreachable.
    pub fn unregister(&self, addr: &SocketAddr) -> bool {
        self.nodes.remove(addr).is_some()
    }

    pub fn is_registered(&self, addr: &SocketAddr) -> bool {
        self.nodes
            .get(addr)
            .map(|weak| weak.strong_count() > 0)
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[async_trait]
impl Transport for MemoryNetwork {
    async fn call(&self, addr: SocketAddr, request: Request) -> Result<Response> {
        let handler = self
            .nodes
            .get(&addr)
            .and_then(|weak| weak.upgrade())
            .ok_or_else(|| OverlayError::Unreachable {
                addr,
                reason: "no node registered at this address".to_string(),
            })?;

        let encoded = bincode::serialize(&Envelope::new(request))?;
        let envelope: Envelope = bincode::deserialize(&encoded)?;
        if envelope.version != PROTOCOL_VERSION {
            return Err(OverlayError::VersionMismatch {
                expected: PROTOCOL_VERSION,
                got: envelope.version,
            });
        }

        let response = match tokio::time::timeout(self.timeout, handler.dispatch(envelope.request))
            .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(OverlayError::NodeStopped)) => {
                return Err(OverlayError::Unreachable {
                    addr,
                    reason: OverlayError::NodeStopped.to_string(),
                });
            }
            Ok(Err(e)) => Response::Error(e.to_string()),
            Err(_) => return Err(OverlayError::Timeout { addr }),
        };

        let encoded = bincode::serialize(&response)?;
        Ok(bincode::deserialize(&encoded)?)
    }
}
