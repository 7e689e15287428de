//! Blocking HTTP transport to the controller.
//!
//! The [`Transport`] trait decouples the controller loop from the network.
//! Tests use scripted transports that return predetermined replies without
//! opening sockets.

use std::io::Read;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use ureq::Agent;

use crate::core::protocol::{Endpoint, TERMINATE_STATUS};
use crate::io::config::AgentConfig;

/// A response the loop can act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub body: String,
    /// The server ordered the agent to erase itself.
    pub control_signal: bool,
}

impl Reply {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            control_signal: false,
        }
    }

    pub fn terminate() -> Self {
        Self {
            status: TERMINATE_STATUS,
            body: String::new(),
            control_signal: true,
        }
    }
}

/// Reasons a request produced no usable data.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection refused, DNS failure, or a connect/total timeout.
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },
    /// The server answered with a non-success status.
    #[error("request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    /// The response body could not be read.
    #[error("read response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

/// Abstraction over the controller connection.
pub trait Transport {
    /// `GET` when `payload` is `None`, otherwise `POST` with a JSON body.
    fn request(&self, endpoint: Endpoint, payload: Option<&Value>)
    -> Result<Reply, TransportError>;
}

/// Transport backed by a `ureq` agent with fixed timeouts.
pub struct HttpTransport {
    agent: Agent,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, connect_timeout: Duration, total_timeout: Duration) -> Self {
        let config = Agent::config_builder()
            .timeout_connect(Some(connect_timeout))
            .timeout_global(Some(total_timeout))
            // Status codes are inspected here (418 on /ping is a signal, not an error).
            .http_status_as_error(false)
            .build();
        Self {
            agent: Agent::new_with_config(config),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(cfg: &AgentConfig) -> Self {
        Self::new(cfg.base_url(), cfg.connect_timeout(), cfg.request_timeout())
    }

    pub fn url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }
}

impl Transport for HttpTransport {
    #[instrument(skip_all, fields(endpoint = endpoint.path()))]
    fn request(
        &self,
        endpoint: Endpoint,
        payload: Option<&Value>,
    ) -> Result<Reply, TransportError> {
        let url = self.url(endpoint);
        info!(%url, "starting HTTP request");

        let sent = match payload {
            Some(value) => {
                let body = value.to_string();
                info!(payload = %body, "method: POST");
                self.agent
                    .post(url.as_str())
                    .header("Content-Type", "application/json")
                    .send(body.as_bytes())
            }
            None => {
                info!("method: GET");
                self.agent.get(url.as_str()).call()
            }
        };

        let response = match sent {
            Ok(response) => response,
            Err(err) => {
                warn!(%url, err = %err, "request failed");
                return Err(TransportError::Network {
                    url,
                    source: Box::new(err),
                });
            }
        };

        let status = response.status().as_u16();
        info!(status, "response code");

        if endpoint == Endpoint::Ping && status == TERMINATE_STATUS {
            warn!("controller sent terminate signal");
            return Ok(Reply {
                status,
                body: String::new(),
                control_signal: true,
            });
        }

        let mut reader = response.into_body().into_reader();
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .map_err(|source| TransportError::Body {
                url: url.clone(),
                source,
            })?;
        let body = String::from_utf8_lossy(&buf).into_owned();
        info!(body = %body, "response body");

        if !(200..300).contains(&status) {
            warn!(%url, status, "non-success status");
            return Err(TransportError::Status { url, status });
        }

        debug!(bytes = buf.len(), "request completed");
        Ok(Reply {
            status,
            body,
            control_signal: false,
        })
    }
}
