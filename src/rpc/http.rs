use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;

use super::protocol::{ENDPOINT_RPC, Envelope, Request, Response};
use super::transport::Transport;
use crate::error::{OverlayError, Result};

/// Peer transport over HTTP: bincode envelopes POSTed to [`ENDPOINT_RPC`].
///
/// The underlying `reqwest::Client` pools connections, so each peer pair keeps
/// one long-lived connection that is reused across calls and re-dialled after
/// a failure.
pub struct HttpTransport {
    http_client: reqwest::Client,
    timeout: Duration,
    attempts: usize,
}

impl HttpTransport {
    pub fn new(timeout: Duration, attempts: usize) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            timeout,
            attempts: attempts.max(1),
        }
    }

    async fn post_with_retry(
        &self,
        url: String,
        body: Vec<u8>,
        addr: SocketAddr,
    ) -> Result<reqwest::Response> {
        let mut delay_ms = 50u64;

        for attempt in 0..self.attempts {
            let response = self
                .http_client
                .post(url.clone())
                .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                .body(body.clone())
                .timeout(self.timeout)
                .send()
                .await;

            match response {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    if attempt + 1 == self.attempts {
                        return Err(classify(addr, e));
                    }
                    tracing::debug!("RPC to {} failed (attempt {}): {}", addr, attempt + 1, e);
                    let jitter = rand::random::<u64>() % 25;
                    tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                    delay_ms = (delay_ms * 2).min(400);
                }
            }
        }

        Err(OverlayError::Unreachable {
            addr,
            reason: "retry attempts exhausted".to_string(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, addr: SocketAddr, request: Request) -> Result<Response> {
        let name = request.name();
        let body = bincode::serialize(&Envelope::new(request))?;

        let response = self
            .post_with_retry(format!("http://{}{}", addr, ENDPOINT_RPC), body, addr)
            .await?;

        if response.status() == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            return Err(OverlayError::Unreachable {
                addr,
                reason: OverlayError::NodeStopped.to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(OverlayError::Remote(format!(
                "{} rejected by {}: {}",
                name,
                addr,
                response.status()
            )));
        }

        let bytes = response.bytes().await.map_err(|e| classify(addr, e))?;
        Ok(bincode::deserialize(&bytes)?)
    }
}

fn classify(addr: SocketAddr, e: reqwest::Error) -> OverlayError {
    if e.is_timeout() {
        OverlayError::Timeout { addr }
    } else {
        OverlayError::Unreachable {
            addr,
            reason: e.to_string(),
        }
    }
}
