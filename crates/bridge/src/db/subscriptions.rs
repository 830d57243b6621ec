use anyhow::{bail, Result};
use sqlx::{QueryBuilder, Sqlite};
use uuid::Uuid;

use super::{DbClient, NewSubscription, SubscriptionCriteria, SubscriptionRecord};
use crate::api::Provider;

type SubscriptionRow = (String, String, String, String, String, String);

impl DbClient {
    /// Lists subscriptions matching every populated field of `criteria`.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn find_subscriptions(
        &self,
        criteria: &SubscriptionCriteria,
    ) -> Result<Vec<SubscriptionRecord>> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT id, provider, name, platform, channel_id, created_at FROM subscriptions",
        );
        push_criteria(&mut builder, criteria);
        builder.push(" ORDER BY created_at ASC, id ASC");

        let rows = builder
            .build_query_as::<SubscriptionRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, provider, name, platform, channel_id, created_at)| SubscriptionRecord {
                    id,
                    provider,
                    name,
                    platform,
                    channel_id,
                    created_at,
                },
            )
            .collect())
    }

    /// Inserts the subscription unless the same tuple already exists.
    /// Returns `true` when a row was created.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_subscription(&self, subscription: &NewSubscription) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO subscriptions (id, provider, name, platform, channel_id) VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(provider, name, platform, channel_id) DO NOTHING",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(subscription.provider.as_str())
        .bind(&subscription.name)
        .bind(&subscription.channel.platform)
        .bind(&subscription.channel.channel_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes every subscription matching `criteria` and returns how many went.
    ///
    /// # Errors
    /// Returns an error for empty criteria or if the delete fails.
    pub async fn remove_subscriptions(&self, criteria: &SubscriptionCriteria) -> Result<u64> {
        if criteria.is_empty() {
            bail!("refusing to remove subscriptions without criteria");
        }

        let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM subscriptions");
        push_criteria(&mut builder, criteria);

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Counts the channels watching one project.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn count_subscriptions(&self, provider: Provider, name: &str) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM subscriptions WHERE provider = ?1 AND name = ?2",
        )
        .bind(provider.as_str())
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

fn push_criteria<'args>(
    builder: &mut QueryBuilder<'args, Sqlite>,
    criteria: &'args SubscriptionCriteria,
) {
    let filters = [
        ("provider", criteria.provider.map(Provider::as_str)),
        ("name", criteria.name.as_deref()),
        ("platform", criteria.platform.as_deref()),
        ("channel_id", criteria.channel_id.as_deref()),
    ];

    let mut separator = " WHERE ";
    for (column, value) in filters {
        if let Some(value) = value {
            builder.push(separator);
            builder.push(column);
            builder.push(" = ");
            builder.push_bind(value);
            separator = " AND ";
        }
    }
}
