//! Inbound NewReleases webhook: authenticate, look up subscribers, broadcast.

use std::fmt;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware;
use axum::routing::post;
use axum::Router;
use minijinja::context;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::api::Provider;
use crate::config::BridgeConfig;
use crate::db::{DbClient, SubscriptionCriteria, SubscriptionRecord};
use crate::gateway::{self, Broadcaster};
use crate::messages::{format_time, Messages};
use crate::request_logging::{log_webhook_request, WEBHOOK_BODY_LIMIT_BYTES};

pub mod signature;


#[derive(Debug, Clone, Deserialize)]
pub struct PayloadNote {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
}

/// Body of a release notification pushed by NewReleases.
#[derive(Debug, Clone, Deserialize)]
pub struct Payload {
    pub provider: Provider,
    pub project: String,
    pub version: String,
    pub time: String,
    #[serde(default)]
    pub note: Option<PayloadNote>,
    #[serde(default)]
    pub project_note: Option<String>,
}

#[derive(Clone)]
pub struct WebhookState {
    pub db: DbClient,
    pub gateway: Arc<dyn Broadcaster>,
    pub messages: Arc<Messages>,
    pub secret: Option<String>,
}

impl fmt::Debug for WebhookState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("WebhookState")
            .field("db", &self.db)
            .field("messages", &self.messages)
            .field("secret", &self.secret.as_ref().map(|_| "***"))
            .finish_non_exhaustive()
    }
}

#[must_use]
pub fn router(state: WebhookState, path: &str) -> Router {
    Router::new()
        .route(path, post(receive_release))
        .layer(DefaultBodyLimit::max(WEBHOOK_BODY_LIMIT_BYTES))
        .layer(middleware::from_fn(log_webhook_request))
        .with_state(state)
}

/// Serves the webhook endpoint until the process is stopped.
///
/// # Errors
/// Returns an error if notifications are disabled, or if the store, gateway or
/// listener cannot be set up.
pub async fn run(config: &BridgeConfig) -> Result<()> {
    if !config.notification_enabled() {
        bail!("release notifications are disabled; set notification.enabled to serve webhooks");
    }

    let database_path = config.database_path();
    let db = DbClient::initialize(&database_path).await?;
    let messages = Messages::new(config.locale()?)?;
    let state = WebhookState {
        db,
        gateway: gateway::from_config(config)?,
        messages: Arc::new(messages),
        secret: config.webhook_secret(),
    };

    if state.secret.is_none() {
        warn!("no webhook secret configured; signatures will not be checked");
    }

    let path = config.webhook_path();
    let bind_address = config.bind_address();
    let app = router(state, &path);
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind webhook listener: {bind_address}"))?;

    info!(%database_path, "subscription store initialized");
    info!(%bind_address, %path, "listening for release webhooks");

    axum::serve(listener, app).await?;
    Ok(())
}

pub(crate) async fn receive_release(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    if let Some(secret) = state.secret.as_deref() {
        if !is_authentic(secret, &headers, &body) {
            warn!("rejected webhook with invalid signature");
            return (StatusCode::UNAUTHORIZED, "Unauthorized");
        }
    }

    let payload = match serde_json::from_slice::<Payload>(&body) {
        Ok(payload) => payload,
        Err(error) => {
            warn!(%error, "ignoring malformed webhook payload");
            return (StatusCode::OK, "ok");
        }
    };

    let name = payload.project.to_lowercase();
    let subscribers = match state
        .db
        .find_subscriptions(&SubscriptionCriteria::for_project(payload.provider, &name))
        .await
    {
        Ok(records) => records,
        Err(error) => {
            error!(%error, provider = %payload.provider, project = %name, "subscriber lookup failed");
            return (StatusCode::OK, "ok");
        }
    };

    let channels = subscribers
        .iter()
        .map(SubscriptionRecord::target)
        .collect::<Vec<_>>();
    if channels.is_empty() {
        debug!(provider = %payload.provider, project = %name, "release has no subscribers");
        return (StatusCode::OK, "ok");
    }

    let message = match state.messages.render(
        "new-release",
        context! {
            provider => payload.provider.as_str(),
            project => &payload.project,
            version => &payload.version,
            time => format_time(&payload.time),
        },
    ) {
        Ok(message) => message,
        Err(error) => {
            error!(%error, "failed to render release notification");
            return (StatusCode::OK, "ok");
        }
    };

    // Once authenticated, the sender always gets "ok".
    match state.gateway.broadcast(&channels, &message).await {
        Ok(()) => info!(
            provider = %payload.provider,
            project = %name,
            version = %payload.version,
            channels = channels.len(),
            "release notification sent"
        ),
        Err(error) => warn!(%error, channels = channels.len(), "release broadcast failed"),
    }

    (StatusCode::OK, "ok")
}

fn is_authentic(secret: &str, headers: &HeaderMap, body: &[u8]) -> bool {
    match (
        header_value(headers, signature::SIGNATURE_HEADER),
        header_value(headers, signature::TIMESTAMP_HEADER),
    ) {
        (Some(provided), Some(timestamp)) => signature::verify(secret, timestamp, body, provided),
        _ => false,
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
