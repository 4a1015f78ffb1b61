use crate::domain::{ContentStatus, SubscriptionTier, TransactionType};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, EntityTrait,
    QueryFilter, Statement, TransactionTrait,
};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::entities::{content_history, token_transactions, token_usage, user_subscriptions};

pub mod migrator;
pub mod repositories;

pub use repositories::content::{ContentItem, ContentPatch, ContentQuery, NewContent};
pub use repositories::subscription::{SubscriptionChange, UserSubscription};
pub use repositories::token::{TokenBalance, TokenTransaction};

/// Rows removed by [`Store::delete_user_data`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct DeletedRows {
    pub content_history: u64,
    pub token_transactions: u64,
    pub token_usage: u64,
    pub user_subscriptions: u64,
}

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if let Some(path_str) = sqlite_file_path(db_url) {
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn subscription_repo(&self) -> repositories::subscription::SubscriptionRepository {
        repositories::subscription::SubscriptionRepository::new(self.conn.clone())
    }

    fn token_repo(&self) -> repositories::token::TokenRepository {
        repositories::token::TokenRepository::new(self.conn.clone())
    }

    fn content_repo(&self) -> repositories::content::ContentRepository {
        repositories::content::ContentRepository::new(self.conn.clone())
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    pub async fn get_subscription(&self, user_id: &str) -> Result<Option<UserSubscription>> {
        self.subscription_repo().get(user_id).await
    }

    pub async fn get_subscription_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<UserSubscription>> {
        self.subscription_repo().get_by_customer(customer_id).await
    }

    pub async fn insert_default_subscription(&self, user_id: &str) -> Result<bool> {
        self.subscription_repo().insert_default(user_id).await
    }

    pub async fn upsert_subscription(
        &self,
        user_id: &str,
        change: SubscriptionChange,
    ) -> Result<UserSubscription> {
        self.subscription_repo().upsert(user_id, change).await
    }

    pub async fn update_subscription(
        &self,
        user_id: &str,
        change: SubscriptionChange,
    ) -> Result<bool> {
        self.subscription_repo().apply(user_id, change).await
    }

    /// Tier used for allowances and gating; FREE when no row exists.
    pub async fn effective_tier(&self, user_id: &str) -> Result<SubscriptionTier> {
        Ok(self
            .get_subscription(user_id)
            .await?
            .map_or(SubscriptionTier::Free, |s| s.effective_tier()))
    }

    // ========================================================================
    // Token balances and transactions
    // ========================================================================

    pub async fn get_token_balance(&self, user_id: &str) -> Result<Option<TokenBalance>> {
        self.token_repo().get(user_id).await
    }

    pub async fn insert_token_balance(
        &self,
        user_id: &str,
        allowance: i32,
        reset_date: DateTime<Utc>,
    ) -> Result<bool> {
        self.token_repo()
            .insert_if_absent(user_id, allowance, reset_date)
            .await
    }

    pub async fn debit_tokens(&self, user_id: &str, cost: i32) -> Result<bool> {
        self.token_repo().debit(user_id, cost).await
    }

    pub async fn credit_tokens(&self, user_id: &str, amount: i32) -> Result<bool> {
        self.token_repo().credit(user_id, amount).await
    }

    pub async fn set_token_balance(
        &self,
        user_id: &str,
        remaining: i32,
        reset_date: DateTime<Utc>,
        only_if_due: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        self.token_repo()
            .set_balance(user_id, remaining, reset_date, only_if_due)
            .await
    }

    pub async fn list_balances_due(&self, now: DateTime<Utc>) -> Result<Vec<TokenBalance>> {
        self.token_repo().list_due(now).await
    }

    /// `amount` is unsigned in meaning; the stored sign follows `kind`.
    pub async fn record_token_transaction(
        &self,
        user_id: &str,
        amount: i32,
        kind: TransactionType,
        content_id: Option<&str>,
    ) -> bool {
        self.token_repo()
            .record_transaction(user_id, amount, kind, content_id)
            .await
    }

    pub async fn token_history(&self, user_id: &str, limit: u64) -> Result<Vec<TokenTransaction>> {
        self.token_repo().history(user_id, limit).await
    }

    // ========================================================================
    // Content history
    // ========================================================================

    pub async fn insert_content(&self, new: NewContent<'_>) -> Result<ContentItem> {
        self.content_repo().insert(new).await
    }

    pub async fn get_content(&self, id: &str, user_id: &str) -> Result<Option<ContentItem>> {
        self.content_repo().get(id, user_id).await
    }

    pub async fn list_content(&self, user_id: &str, query: ContentQuery) -> Result<Vec<ContentItem>> {
        self.content_repo().list(user_id, query).await
    }

    pub async fn update_content(
        &self,
        id: &str,
        user_id: &str,
        patch: ContentPatch,
    ) -> Result<bool> {
        self.content_repo().update(id, user_id, patch).await
    }

    pub async fn update_content_status(
        &self,
        id: &str,
        user_id: &str,
        status: ContentStatus,
    ) -> Result<bool> {
        let patch = ContentPatch {
            status: Some(status),
            ..Default::default()
        };
        self.content_repo().update(id, user_id, patch).await
    }

    pub async fn set_content_image(&self, id: &str, user_id: &str, url: &str) -> Result<bool> {
        self.content_repo().set_image_url(id, user_id, url).await
    }

    pub async fn delete_content(&self, id: &str, user_id: &str) -> Result<bool> {
        self.content_repo().delete(id, user_id).await
    }

    // ========================================================================
    // Accounts
    // ========================================================================

    /// Removes every row owned by `user_id` in one transaction.
    pub async fn delete_user_data(&self, user_id: &str) -> Result<DeletedRows> {
        let txn = self.conn.begin().await?;

        let content = content_history::Entity::delete_many()
            .filter(content_history::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;

        let transactions = token_transactions::Entity::delete_many()
            .filter(token_transactions::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;

        let usage = token_usage::Entity::delete_many()
            .filter(token_usage::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;

        let subscriptions = user_subscriptions::Entity::delete_many()
            .filter(user_subscriptions::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        let deleted = DeletedRows {
            content_history: content.rows_affected,
            token_transactions: transactions.rows_affected,
            token_usage: usage.rows_affected,
            user_subscriptions: subscriptions.rows_affected,
        };
        info!(user_id, ?deleted, "Deleted user data");
        Ok(deleted)
    }
}

/// Filesystem path of a file-backed SQLite URL, `None` for in-memory
/// databases and other backends.
fn sqlite_file_path(db_url: &str) -> Option<&str> {
    let rest = db_url.strip_prefix("sqlite:")?;
    let path = rest.trim_start_matches("//");
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() || path.starts_with(":memory:") {
        None
    } else {
        Some(path)
    }
}
