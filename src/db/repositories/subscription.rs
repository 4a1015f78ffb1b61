use crate::domain::SubscriptionTier;
use crate::entities::{prelude::*, user_subscriptions};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::Serialize;
use tracing::{info, warn};

/// Local view of a user's plan, as last reported by the billing provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSubscription {
    pub user_id: String,
    pub subscription_tier: SubscriptionTier,
    pub is_active: bool,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub cancel_at_period_end: bool,
    pub subscription_start_date: Option<DateTime<Utc>>,
    pub subscription_end_date: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserSubscription {
    /// The implicit plan of a user that never bought anything.
    #[must_use]
    pub fn implicit_free(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            subscription_tier: SubscriptionTier::Free,
            is_active: true,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            cancel_at_period_end: false,
            subscription_start_date: None,
            subscription_end_date: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Tier that currently applies for feature gating. An inactive paid
    /// subscription behaves like FREE.
    #[must_use]
    pub fn effective_tier(&self) -> SubscriptionTier {
        if self.is_active {
            self.subscription_tier
        } else {
            SubscriptionTier::Free
        }
    }
}

/// Partial update of a subscription row. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionChange {
    pub tier: Option<SubscriptionTier>,
    pub is_active: Option<bool>,
    pub stripe_customer_id: Option<String>,
    /// `Some(None)` clears the stored subscription id.
    pub stripe_subscription_id: Option<Option<String>>,
    pub cancel_at_period_end: Option<bool>,
    pub subscription_start_date: Option<DateTime<Utc>>,
    pub subscription_end_date: Option<DateTime<Utc>>,
}

pub struct SubscriptionRepository {
    conn: DatabaseConnection,
}

impl SubscriptionRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_model(m: user_subscriptions::Model) -> UserSubscription {
        let tier = m.subscription_tier.parse().unwrap_or_else(|_| {
            warn!(
                user_id = %m.user_id,
                tier = %m.subscription_tier,
                "Unknown subscription tier on file, treating as FREE"
            );
            SubscriptionTier::Free
        });

        UserSubscription {
            user_id: m.user_id,
            subscription_tier: tier,
            is_active: m.is_active,
            stripe_customer_id: m.stripe_customer_id,
            stripe_subscription_id: m.stripe_subscription_id,
            cancel_at_period_end: m.cancel_at_period_end,
            subscription_start_date: m.subscription_start_date,
            subscription_end_date: m.subscription_end_date,
            created_at: Some(m.created_at),
            updated_at: Some(m.updated_at),
        }
    }

    pub async fn get(&self, user_id: &str) -> Result<Option<UserSubscription>> {
        let row = UserSubscriptions::find()
            .filter(user_subscriptions::Column::UserId.eq(user_id))
            .one(&self.conn)
            .await
            .context("Failed to query subscription by user")?;

        Ok(row.map(Self::map_model))
    }

    pub async fn get_by_customer(&self, customer_id: &str) -> Result<Option<UserSubscription>> {
        let row = UserSubscriptions::find()
            .filter(user_subscriptions::Column::StripeCustomerId.eq(customer_id))
            .one(&self.conn)
            .await
            .context("Failed to query subscription by customer id")?;

        Ok(row.map(Self::map_model))
    }

    /// Inserts a FREE row unless one already exists. Returns whether a row
    /// was created.
    pub async fn insert_default(&self, user_id: &str) -> Result<bool> {
        let now = Utc::now();
        let model = user_subscriptions::ActiveModel {
            user_id: Set(user_id.to_string()),
            subscription_tier: Set(SubscriptionTier::Free.as_str().to_string()),
            is_active: Set(true),
            stripe_customer_id: Set(None),
            stripe_subscription_id: Set(None),
            cancel_at_period_end: Set(false),
            subscription_start_date: Set(None),
            subscription_end_date: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let inserted = UserSubscriptions::insert(model)
            .on_conflict(
                OnConflict::column(user_subscriptions::Column::UserId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await
            .context("Failed to insert default subscription")?;

        if inserted > 0 {
            info!(user_id, "Created FREE subscription row");
        }
        Ok(inserted > 0)
    }

    /// Ensures a row exists and applies `change` to it.
    pub async fn upsert(&self, user_id: &str, change: SubscriptionChange) -> Result<UserSubscription> {
        self.insert_default(user_id).await?;
        self.apply(user_id, change).await?;

        self.get(user_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Subscription row vanished for user {user_id}"))
    }

    /// Applies `change` to an existing row. Returns `false` when the user has
    /// no row.
    pub async fn apply(&self, user_id: &str, change: SubscriptionChange) -> Result<bool> {
        use user_subscriptions::Column;

        let mut update = UserSubscriptions::update_many()
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now()));

        if let Some(tier) = change.tier {
            update = update.col_expr(Column::SubscriptionTier, Expr::value(tier.as_str()));
        }
        if let Some(active) = change.is_active {
            update = update.col_expr(Column::IsActive, Expr::value(active));
        }
        if let Some(customer) = change.stripe_customer_id {
            update = update.col_expr(Column::StripeCustomerId, Expr::value(customer));
        }
        if let Some(subscription) = change.stripe_subscription_id {
            update = update.col_expr(Column::StripeSubscriptionId, Expr::value(subscription));
        }
        if let Some(flag) = change.cancel_at_period_end {
            update = update.col_expr(Column::CancelAtPeriodEnd, Expr::value(flag));
        }
        if let Some(start) = change.subscription_start_date {
            update = update.col_expr(Column::SubscriptionStartDate, Expr::value(start));
        }
        if let Some(end) = change.subscription_end_date {
            update = update.col_expr(Column::SubscriptionEndDate, Expr::value(end));
        }

        let result = update
            .filter(Column::UserId.eq(user_id))
            .exec(&self.conn)
            .await
            .context("Failed to update subscription")?;

        Ok(result.rows_affected > 0)
    }
}
