use crate::clients::{AuthProvider, BillingProvider};
use crate::db::Store;
use crate::domain::UserId;
use crate::services::account_service::{AccountDeletion, AccountError, AccountService, Profile};
use crate::services::subscription_service::SubscriptionService;
use crate::services::token_ledger::TokenLedger;
use std::sync::Arc;
use tracing::{info, warn};

pub struct DefaultAccountService {
    store: Arc<Store>,
    ledger: Arc<dyn TokenLedger>,
    subscriptions: Arc<dyn SubscriptionService>,
    billing: Arc<dyn BillingProvider>,
    auth: Arc<dyn AuthProvider>,
}

impl DefaultAccountService {
    #[must_use]
    pub fn new(
        store: Arc<Store>,
        ledger: Arc<dyn TokenLedger>,
        subscriptions: Arc<dyn SubscriptionService>,
        billing: Arc<dyn BillingProvider>,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        Self {
            store,
            ledger,
            subscriptions,
            billing,
            auth,
        }
    }
}

#[async_trait::async_trait]
impl AccountService for DefaultAccountService {
    async fn profile(&self, user: &UserId, email: Option<&str>) -> Result<Profile, AccountError> {
        let (subscription, tokens) =
            tokio::join!(self.subscriptions.get(user), self.ledger.balance(user));

        Ok(Profile {
            user_id: user.clone(),
            email: email.map(ToString::to_string),
            subscription: subscription?,
            tokens: tokens?,
        })
    }

    async fn delete_account(&self, user: &UserId) -> Result<AccountDeletion, AccountError> {
        let subscription_id = self
            .store
            .get_subscription(user.as_str())
            .await?
            .and_then(|s| s.stripe_subscription_id);

        let billing_cancelled = match subscription_id {
            Some(id) => match self.billing.cancel_immediately(&id).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(user_id = %user, subscription_id = %id, error = %e, "Could not cancel subscription during account deletion");
                    false
                }
            },
            None => false,
        };

        let deleted = self.store.delete_user_data(user.as_str()).await?;

        let auth_user_deleted = match self.auth.delete_user(user).await {
            Ok(()) => true,
            Err(e) => {
                warn!(user_id = %user, error = %e, "Could not delete user from auth provider");
                false
            }
        };

        info!(user_id = %user, billing_cancelled, auth_user_deleted, "Account deleted");
        Ok(AccountDeletion {
            deleted,
            billing_cancelled,
            auth_user_deleted,
        })
    }
}
