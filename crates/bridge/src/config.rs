use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::api::{Provider, DEFAULT_ENDPOINT};
use crate::messages::Locale;

const DEFAULT_CONFIG_PATH: &str = "/opt/nr-bridge/config.json";

const DEFAULT_DB_PATH: &str = "/opt/nr-bridge/data/subscriptions.db";
const DEFAULT_PROVIDER: Provider = Provider::Github;
const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:5140";
const DEFAULT_WEBHOOK_PATH: &str = "/webhook/newreleases";
const DEFAULT_WEBHOOK_NAME: &str = "koishi";

#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub api_key: Option<String>,
    pub api_endpoint: Option<String>,
    pub default_provider: Option<String>,
    pub locale: Option<String>,
    pub database_path: Option<String>,
    pub notification: NotificationConfig,
    pub gateway: GatewayConfig,
}

#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: Option<bool>,
    pub bind_address: Option<String>,
    pub webhook_path: Option<String>,
    pub webhook_name: Option<String>,
    pub webhook_secret: Option<String>,
}

#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub url: Option<String>,
    pub token: Option<String>,
}

impl fmt::Debug for BridgeConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("BridgeConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("api_endpoint", &self.api_endpoint)
            .field("default_provider", &self.default_provider)
            .field("locale", &self.locale)
            .field("database_path", &self.database_path)
            .field("notification", &self.notification)
            .field("gateway", &self.gateway)
            .finish()
    }
}

impl fmt::Debug for NotificationConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("NotificationConfig")
            .field("enabled", &self.enabled)
            .field("bind_address", &self.bind_address)
            .field("webhook_path", &self.webhook_path)
            .field("webhook_name", &self.webhook_name)
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "***"))
            .finish()
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("GatewayConfig")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish()
    }
}

impl BridgeConfig {
    /// Reads the JSON config file; a missing file yields defaults.
    ///
    /// # Errors
    ///
    /// This function will return an error if the config file is located but JSON contents cannot be parsed
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("NR_BRIDGE_CONFIG_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

        let path = Path::new(&config_path);
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {config_path}"))?;

        let config = serde_json::from_str::<Self>(&raw)
            .with_context(|| format!("Failed to parse config JSON: {config_path}"))?;

        Ok(config)
    }

    /// # Errors
    /// Returns an error when no API key is configured.
    pub fn api_key(&self) -> Result<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("NR_BRIDGE_API_KEY").ok())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .context("NewReleases API key is required (api_key or NR_BRIDGE_API_KEY)")
    }

    #[must_use]
    pub fn api_endpoint(&self) -> String {
        self.api_endpoint
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_ENDPOINT)
            .trim_end_matches('/')
            .to_string()
    }

    /// # Errors
    /// Returns an error when the configured provider is not supported.
    pub fn default_provider(&self) -> Result<Provider> {
        match self
            .default_provider
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            Some(value) => value
                .parse::<Provider>()
                .with_context(|| format!("Invalid default_provider: {value}")),
            None => Ok(DEFAULT_PROVIDER),
        }
    }

    /// # Errors
    /// Returns an error when the configured locale is not supported.
    pub fn locale(&self) -> Result<Locale> {
        match self
            .locale
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            Some(value) => value
                .parse::<Locale>()
                .with_context(|| format!("Invalid locale: {value}")),
            None => Ok(Locale::default()),
        }
    }

    #[must_use]
    pub fn database_path(&self) -> String {
        self.database_path
            .clone()
            .or_else(|| std::env::var("NR_BRIDGE_DB_PATH").ok())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_DB_PATH.to_string())
    }

    #[must_use]
    pub fn notification_enabled(&self) -> bool {
        self.notification
            .enabled
            .or_else(|| {
                std::env::var("NR_BRIDGE_NOTIFICATION_ENABLED")
                    .ok()
                    .map(|value| {
                        value.trim().eq_ignore_ascii_case("true") || value.trim() == "1"
                    })
            })
            .unwrap_or(false)
    }

    #[must_use]
    pub fn bind_address(&self) -> String {
        self.notification
            .bind_address
            .as_deref()
            .unwrap_or(DEFAULT_BIND_ADDRESS)
            .trim()
            .to_string()
    }

    /// Webhook route, always starting with `/`.
    #[must_use]
    pub fn webhook_path(&self) -> String {
        let path = self
            .notification
            .webhook_path
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_WEBHOOK_PATH);

        if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        }
    }

    #[must_use]
    pub fn webhook_name(&self) -> String {
        self.notification
            .webhook_name
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_WEBHOOK_NAME)
            .to_string()
    }

    #[must_use]
    pub fn webhook_secret(&self) -> Option<String> {
        self.notification
            .webhook_secret
            .clone()
            .or_else(|| std::env::var("NR_BRIDGE_WEBHOOK_SECRET").ok())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    #[must_use]
    pub fn gateway_url(&self) -> Option<String> {
        self.gateway
            .url
            .clone()
            .or_else(|| std::env::var("NR_BRIDGE_GATEWAY_URL").ok())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    #[must_use]
    pub fn gateway_token(&self) -> Option<String> {
        self.gateway
            .token
            .clone()
            .or_else(|| std::env::var("NR_BRIDGE_GATEWAY_TOKEN").ok())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}
