//! Node Configuration
//!
//! `OverlayConfig` carries the protocol tunables into a node; `NodeConfig` adds
//! what the binary needs to start one (addresses, optional fixed id) and is
//! parsed from command-line flags.

use anyhow::{Result, anyhow, bail};
use std::net::SocketAddr;
use std::time::Duration;

use crate::identifier::Id;

const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_millis(2000);
const DEFAULT_HOP_RETRIES: usize = 8;
const DEFAULT_REPLICAS: u8 = 2;
const DEFAULT_REPUBLISH_INTERVAL: Duration = Duration::from_secs(10);
const DEFAULT_RECORD_TTL: Duration = Duration::from_secs(30);
const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_HTTP_ATTEMPTS: usize = 2;

#[derive(Debug, Clone)]
pub struct OverlayConfig {
    /// Upper bound on a single peer call.
    pub rpc_timeout: Duration,
    /// Failed hops tolerated by one root resolution before giving up.
    pub hop_retries: usize,
    /// Salted copies published per key.
    pub replicas: u8,
    pub republish_interval: Duration,
    /// How long a root keeps a record that is not republished.
    pub record_ttl: Duration,
    /// Period of the neighbour liveness sweep.
    pub probe_interval: Duration,
    /// Send attempts per call for socket transports.
    pub http_attempts: usize,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
            hop_retries: DEFAULT_HOP_RETRIES,
            replicas: DEFAULT_REPLICAS,
            republish_interval: DEFAULT_REPUBLISH_INTERVAL,
            record_ttl: DEFAULT_RECORD_TTL,
            probe_interval: DEFAULT_PROBE_INTERVAL,
            http_attempts: DEFAULT_HTTP_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_addr: SocketAddr,
    pub seed: Option<SocketAddr>,
    pub id: Option<Id>,
    pub overlay: OverlayConfig,
}

impl NodeConfig {
    pub const USAGE: &'static str = "--bind <addr:port> [--seed <addr:port>] [--id <hex>] \
         [--timeout-ms <n>] [--republish-secs <n>] [--ttl-secs <n>] [--replicas <n>]";

    /// Name to print in usage lines; the OS may hand us an empty argv.
    pub fn program_name(args: &[String]) -> &str {
        args.first().map(String::as_str).unwrap_or("tapestry-node")
    }

    /// Parses flags (without the program name).
    pub fn from_args(args: &[String]) -> Result<Self> {
        let mut bind_addr: Option<SocketAddr> = None;
        let mut seed: Option<SocketAddr> = None;
        let mut id: Option<Id> = None;
        let mut overlay = OverlayConfig::default();

        let mut i = 0;
        while i < args.len() {
            let flag = args[i].as_str();
            let value = || {
                args.get(i + 1)
                    .ok_or_else(|| anyhow!("{} expects a value", flag))
            };

            match flag {
                "--bind" => bind_addr = Some(value()?.parse()?),
                "--seed" => seed = Some(value()?.parse()?),
                "--id" => id = Some(value()?.parse()?),
                "--timeout-ms" => {
                    overlay.rpc_timeout = Duration::from_millis(value()?.parse()?)
                }
                "--republish-secs" => {
                    overlay.republish_interval = Duration::from_secs(value()?.parse()?)
                }
                "--ttl-secs" => overlay.record_ttl = Duration::from_secs(value()?.parse()?),
                "--replicas" => overlay.replicas = value()?.parse()?,
                other => bail!("unknown flag {}", other),
            }
            i += 2;
        }

        let bind_addr = bind_addr.ok_or_else(|| anyhow!("--bind is required"))?;

        if overlay.replicas == 0 {
            bail!("--replicas must be at least 1");
        }
        if overlay.record_ttl <= overlay.republish_interval {
            tracing::warn!(
                "Record TTL {:?} does not exceed the republish interval {:?}; records may lapse",
                overlay.record_ttl,
                overlay.republish_interval
            );
        }

        Ok(Self {
            bind_addr,
            seed,
            id,
            overlay,
        })
    }
}
