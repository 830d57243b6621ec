use std::path::Path;

use anyhow::{bail, Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};

use crate::api::Provider;

mod subscriptions;


/// A chat channel, addressed the way the hosting runtime addresses it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChannelRef {
    pub platform: String,
    pub channel_id: String,
}

impl ChannelRef {
    #[must_use]
    pub fn new(platform: &str, channel_id: &str) -> Self {
        Self {
            platform: platform.to_string(),
            channel_id: channel_id.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub provider: Provider,
    pub name: String,
    pub channel: ChannelRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRecord {
    pub id: String,
    pub provider: String,
    pub name: String,
    pub platform: String,
    pub channel_id: String,
    pub created_at: String,
}

impl SubscriptionRecord {
    /// Broadcast target in `<platform>:<channel_id>` form.
    #[must_use]
    pub fn target(&self) -> String {
        format!("{}:{}", self.platform, self.channel_id)
    }
}

/// Equality filter over the subscription tuple; `None` fields match anything.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionCriteria {
    pub provider: Option<Provider>,
    pub name: Option<String>,
    pub platform: Option<String>,
    pub channel_id: Option<String>,
}

impl SubscriptionCriteria {
    #[must_use]
    pub fn for_project(provider: Provider, name: &str) -> Self {
        Self {
            provider: Some(provider),
            name: Some(name.to_string()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn for_channel(channel: &ChannelRef) -> Self {
        Self {
            platform: Some(channel.platform.clone()),
            channel_id: Some(channel.channel_id.clone()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn for_subscription(provider: Provider, name: &str, channel: &ChannelRef) -> Self {
        Self {
            provider: Some(provider),
            name: Some(name.to_string()),
            platform: Some(channel.platform.clone()),
            channel_id: Some(channel.channel_id.clone()),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.provider.is_none()
            && self.name.is_none()
            && self.platform.is_none()
            && self.channel_id.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct DbClient {
    pool: Pool<Sqlite>,
}

impl DbClient {
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let connect_options = SqliteConnectOptions::new()
            .filename(database_url)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await
            .with_context(|| format!("Failed to open subscription database: {database_url}"))?;

        Ok(Self { pool })
    }

    /// Opens the store and brings its schema up to date. Called once at startup.
    ///
    /// # Errors
    /// Returns an error if the directory, connection, migrations or WAL check fail.
    pub async fn initialize(database_path: &str) -> Result<Self> {
        if let Some(parent_dir) = Path::new(database_path).parent() {
            std::fs::create_dir_all(parent_dir)?;
        }

        let db = Self::connect(database_path).await?;
        db.run_migrations().await?;
        db.ensure_wal_mode().await?;

        Ok(db)
    }

    /// # Errors
    /// Returns an error if a migration fails.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// # Errors
    /// Returns an error if SQLite refuses WAL journaling.
    pub async fn ensure_wal_mode(&self) -> Result<()> {
        let journal_mode: String = sqlx::query_scalar("PRAGMA journal_mode=WAL;")
            .fetch_one(&self.pool)
            .await?;

        if journal_mode.to_uppercase() != "WAL" {
            bail!("SQLite WAL mode is not enabled");
        }

        Ok(())
    }
}
