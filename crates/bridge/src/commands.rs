//! Chat-facing commands. Each returns the localized reply text; only store and
//! template failures surface as errors.

use std::sync::Arc;

use anyhow::Result;
use minijinja::{context, Value};
use tracing::{info, warn};

use crate::api::{ApiError, Found, Project, ProjectInfo, Provider, Release, ReleaseClient};
use crate::config::BridgeConfig;
use crate::db::{ChannelRef, DbClient, NewSubscription, SubscriptionCriteria};
use crate::messages::{format_time, Messages};
use crate::resolver::{resolve_project, ResolveError};


#[derive(Clone, Debug)]
pub struct CommandContext {
    pub client: ReleaseClient,
    pub db: DbClient,
    pub messages: Arc<Messages>,
    pub default_provider: Provider,
    pub notifications_enabled: bool,
    pub webhook_name: String,
}

impl CommandContext {
    /// # Errors
    /// Returns an error when the API key is missing, the configuration holds an
    /// invalid provider or locale, or the store cannot be opened.
    pub async fn from_config(config: &BridgeConfig) -> Result<Self> {
        let client = ReleaseClient::new(&config.api_endpoint(), &config.api_key()?)?;
        let db = DbClient::initialize(&config.database_path()).await?;
        let messages = Messages::new(config.locale()?)?;

        Ok(Self {
            client,
            db,
            messages: Arc::new(messages),
            default_provider: config.default_provider()?,
            notifications_enabled: config.notification_enabled(),
            webhook_name: config.webhook_name(),
        })
    }

    /// Shows the requested or latest release, or the first page of releases.
    ///
    /// # Errors
    /// Returns an error when a reply template fails to render.
    pub async fn info(
        &self,
        provider: Option<&str>,
        name: &str,
        version: Option<&str>,
        list: bool,
    ) -> Result<String> {
        let project = match resolve_project(&self.client, self.provider(provider), name).await {
            Ok(project) => project,
            Err(error) => return self.resolve_reply(&error),
        };

        if list {
            let releases = match self
                .client
                .list_releases(project.provider, &project.name, 1)
                .await
                .found()
            {
                Ok(list) => list.map(|list| list.releases).unwrap_or_default(),
                Err(error) => return self.remote_error(&error, "list releases"),
            };
            let releases = releases.iter().map(release_value).collect::<Vec<_>>();
            return self.render(
                "release-list",
                context! { project => &project, releases => releases },
            );
        }

        let requested = version.map(str::trim).filter(|value| !value.is_empty());
        let release = match requested {
            Some(version) => match self
                .client
                .get_release(project.provider, &project.name, Some(version))
                .await
                .found()
            {
                Ok(Some(release)) => release_value(&release),
                Ok(None) => return self.release_not_found(&project, version),
                Err(error) => return self.remote_error(&error, "get release"),
            },
            // A project without releases answers the latest-release lookup with an error.
            None => match self
                .client
                .get_latest_release(project.provider, &project.name)
                .await
            {
                Ok(release) => release_value(&release),
                Err(_) => Value::from(()),
            },
        };

        self.render("release-info", context! { project => &project, release => release })
    }

    /// Shows the note of a release; a blank version means the latest release.
    ///
    /// # Errors
    /// Returns an error when a reply template fails to render.
    pub async fn note(&self, provider: Option<&str>, name: &str, version: &str) -> Result<String> {
        let project = match resolve_project(&self.client, self.provider(provider), name).await {
            Ok(project) => project,
            Err(error) => return self.resolve_reply(&error),
        };

        let version = match version.trim() {
            "" => match self
                .client
                .get_latest_release(project.provider, &project.name)
                .await
                .found()
            {
                Ok(Some(release)) => release.version,
                Ok(None) => return self.release_not_found(&project, "latest"),
                Err(error) => return self.remote_error(&error, "get latest release"),
            },
            version => version.to_string(),
        };

        match self
            .client
            .get_release_note(project.provider, &project.name, &version)
            .await
            .found()
        {
            Ok(Some(note)) => self.render("release-note", context! { note => note }),
            Ok(None) => self.release_not_found(&project, &version),
            Err(error) => self.remote_error(&error, "get release note"),
        }
    }

    /// Subscribes a channel to a project and attaches the bridge webhook to it.
    ///
    /// # Errors
    /// Returns an error when the store or a reply template fails.
    pub async fn watch(
        &self,
        channel: &ChannelRef,
        provider: Option<&str>,
        name: &str,
    ) -> Result<String> {
        if !self.notifications_enabled {
            return self.render("notification-disabled", context! {});
        }

        let project = match resolve_project(&self.client, self.provider(provider), name).await {
            Ok(project) => project,
            Err(error) => return self.resolve_reply(&error),
        };

        let webhook_id = match self.webhook_id().await {
            Ok(Some(id)) => id,
            Ok(None) => {
                return self.render("webhook-not-found", context! { webhook => &self.webhook_name })
            }
            Err(error) => return self.remote_error(&error, "list webhooks"),
        };

        if !project.has_webhook(&webhook_id) {
            let mut webhooks = project.info.webhooks.clone().unwrap_or_default();
            webhooks.push(webhook_id.clone());
            if let Err(error) = self.set_webhooks(&project, webhooks).await {
                return self.remote_error(&error, "attach webhook");
            }
            info!(provider = %project.provider, name = %project.name, %webhook_id, "webhook attached");
        }

        let name = project.name.to_lowercase();
        let inserted = self
            .db
            .insert_subscription(&NewSubscription {
                provider: project.provider,
                name: name.clone(),
                channel: channel.clone(),
            })
            .await?;

        let reply = context! { provider => project.provider.as_str(), name => &name };
        if !inserted {
            return self.render("already-watching", reply);
        }

        info!(
            provider = %project.provider,
            %name,
            platform = %channel.platform,
            channel_id = %channel.channel_id,
            "subscription added"
        );
        self.render("watch-success", reply)
    }

    /// Removes a channel's subscription; the webhook is detached once nobody
    /// watches the project.
    ///
    /// # Errors
    /// Returns an error when the store or a reply template fails.
    pub async fn unwatch(
        &self,
        channel: &ChannelRef,
        provider: Option<&str>,
        name: &str,
    ) -> Result<String> {
        if !self.notifications_enabled {
            return self.render("notification-disabled", context! {});
        }

        let project = match resolve_project(&self.client, self.provider(provider), name).await {
            Ok(project) => project,
            Err(error) => return self.resolve_reply(&error),
        };

        let name = project.name.to_lowercase();
        let reply = context! { provider => project.provider.as_str(), name => &name };
        let removed = self
            .db
            .remove_subscriptions(&SubscriptionCriteria::for_subscription(
                project.provider,
                &name,
                channel,
            ))
            .await?;
        if removed == 0 {
            return self.render("not-subscribed", reply);
        }

        info!(
            provider = %project.provider,
            %name,
            platform = %channel.platform,
            channel_id = %channel.channel_id,
            "subscription removed"
        );

        if self.db.count_subscriptions(project.provider, &name).await? == 0 {
            self.detach_webhook(&project).await;
        }

        self.render("unwatch-success", reply)
    }

    /// Lists the projects a channel watches.
    ///
    /// # Errors
    /// Returns an error when the store or a reply template fails.
    pub async fn subscriptions(&self, channel: &ChannelRef) -> Result<String> {
        let records = self
            .db
            .find_subscriptions(&SubscriptionCriteria::for_channel(channel))
            .await?;
        if records.is_empty() {
            return self.render("no-subscriptions", context! {});
        }

        let subscriptions = records
            .iter()
            .map(|record| context! { provider => &record.provider, name => &record.name })
            .collect::<Vec<_>>();
        self.render("subscription-list", context! { subscriptions => subscriptions })
    }

    async fn webhook_id(&self) -> Result<Option<String>, ApiError> {
        let webhooks = self.client.get_webhooks().await?;
        Ok(webhooks
            .webhooks
            .into_iter()
            .find(|webhook| webhook.name == self.webhook_name)
            .map(|webhook| webhook.id))
    }

    async fn detach_webhook(&self, project: &Project) {
        let webhook_id = match self.webhook_id().await {
            Ok(Some(id)) => id,
            Ok(None) => return,
            Err(error) => {
                warn!(%error, "webhook lookup failed; leaving webhook attached");
                return;
            }
        };
        if !project.has_webhook(&webhook_id) {
            return;
        }

        let webhooks = project
            .info
            .webhooks
            .iter()
            .flatten()
            .filter(|id| **id != webhook_id)
            .cloned()
            .collect();
        match self.set_webhooks(project, webhooks).await {
            Ok(()) => info!(provider = %project.provider, name = %project.name, %webhook_id, "webhook detached"),
            Err(error) => warn!(%error, provider = %project.provider, name = %project.name, "failed to detach webhook"),
        }
    }

    async fn set_webhooks(&self, project: &Project, webhooks: Vec<String>) -> Result<(), ApiError> {
        let info = ProjectInfo {
            webhooks: Some(webhooks),
            ..ProjectInfo::default()
        };
        self.client
            .update_project(project.provider, &project.name, &info)
            .await
            .map(|_| ())
    }

    fn provider<'a>(&self, provider: Option<&'a str>) -> &'a str {
        provider
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(self.default_provider.as_str())
    }

    fn resolve_reply(&self, error: &ResolveError) -> Result<String> {
        match error {
            ResolveError::NameRequired => self.render("project-name-required", context! {}),
            ResolveError::InvalidProvider(provider) => {
                self.render("invalid-provider", context! { provider => provider })
            }
            ResolveError::NotFound { provider, name } => self.render(
                "project-not-found",
                context! { provider => provider.as_str(), name => name },
            ),
        }
    }

    fn release_not_found(&self, project: &Project, version: &str) -> Result<String> {
        self.render(
            "release-not-found",
            context! {
                version => version,
                provider => project.provider.as_str(),
                name => &project.name,
            },
        )
    }

    fn remote_error(&self, error: &ApiError, operation: &str) -> Result<String> {
        warn!(%error, operation, "release service call failed");
        self.render("remote-error", context! {})
    }

    fn render(&self, key: &str, context: Value) -> Result<String> {
        Ok(self.messages.render(key, context)?)
    }
}

fn release_value(release: &Release) -> Value {
    context! {
        version => &release.version,
        date => format_time(&release.date),
    }
}
