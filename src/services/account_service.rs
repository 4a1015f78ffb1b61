use crate::db::{DeletedRows, TokenBalance, UserSubscription};
use crate::domain::UserId;
use crate::services::subscription_service::SubscriptionError;
use crate::services::token_ledger::LedgerError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Subscription(#[from] SubscriptionError),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for AccountError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(format!("{err:#}"))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_id: UserId,
    pub email: Option<String>,
    pub subscription: UserSubscription,
    pub tokens: TokenBalance,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDeletion {
    pub deleted: DeletedRows,
    pub billing_cancelled: bool,
    pub auth_user_deleted: bool,
}

#[async_trait::async_trait]
pub trait AccountService: Send + Sync {
    async fn profile(&self, user: &UserId, email: Option<&str>) -> Result<Profile, AccountError>;

    /// Cancels billing immediately, removes every stored row of the user and
    /// asks the identity provider to drop the account. The billing and
    /// identity steps are best effort; only the local deletion can fail the
    /// call.
    async fn delete_account(&self, user: &UserId) -> Result<AccountDeletion, AccountError>;
}
