//! Outbound delivery of notification text to chat channels.
//!
//! The hosting chat runtime owns the actual platform adapters; this module only
//! knows how to hand it a message and a list of `<platform>:<channel_id>` targets.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::BridgeConfig;

const GATEWAY_TIMEOUT_SECONDS: u64 = 15;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("gateway rejected broadcast: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Delivers `message` to every channel in `channels`.
    async fn broadcast(&self, channels: &[String], message: &str) -> Result<(), GatewayError>;
}

/// Posts broadcasts to the chat runtime's HTTP broadcast endpoint.
pub struct HttpGateway {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl fmt::Debug for HttpGateway {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("HttpGateway")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct BroadcastRequest<'a> {
    channels: &'a [String],
    content: &'a str,
}

impl HttpGateway {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: &str, token: Option<String>) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(GATEWAY_TIMEOUT_SECONDS))
            .build()?;

        Ok(Self {
            client,
            url: url.to_string(),
            token,
        })
    }
}

#[async_trait]
impl Broadcaster for HttpGateway {
    async fn broadcast(&self, channels: &[String], message: &str) -> Result<(), GatewayError> {
        let mut request = self.client.post(&self.url).json(&BroadcastRequest {
            channels,
            content: message,
        });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected(format!("{status}: {body}")));
        }

        Ok(())
    }
}

/// Writes broadcasts to the log; used when no runtime gateway is configured.
#[derive(Debug, Default)]
pub struct LogGateway;

#[async_trait]
impl Broadcaster for LogGateway {
    async fn broadcast(&self, channels: &[String], message: &str) -> Result<(), GatewayError> {
        info!(?channels, %message, "broadcast");
        Ok(())
    }
}

/// # Errors
/// Returns an error if the configured HTTP gateway cannot be built.
pub fn from_config(config: &BridgeConfig) -> Result<Arc<dyn Broadcaster>, GatewayError> {
    match config.gateway_url() {
        Some(url) => Ok(Arc::new(HttpGateway::new(&url, config.gateway_token())?)),
        None => {
            warn!("no gateway url configured; notifications will only be logged");
            Ok(Arc::new(LogGateway))
        }
    }
}
