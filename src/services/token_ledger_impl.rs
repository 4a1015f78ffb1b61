use crate::config::TokenConfig;
use crate::db::{Store, TokenBalance, TokenTransaction};
use crate::domain::{SubscriptionTier, TransactionType, UserId, next_reset_date};
use crate::services::token_ledger::{LedgerError, LedgerInit, TokenLedger};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct SeaOrmTokenLedger {
    store: Arc<Store>,
    config: TokenConfig,
}

impl SeaOrmTokenLedger {
    #[must_use]
    pub const fn new(store: Arc<Store>, config: TokenConfig) -> Self {
        Self { store, config }
    }

    async fn allowance(&self, user: &UserId) -> Result<i32, LedgerError> {
        let tier = self.store.effective_tier(user.as_str()).await?;
        Ok(self.config.allowance_for(tier))
    }

    async fn read(&self, user: &UserId) -> Result<TokenBalance, LedgerError> {
        self.store
            .get_token_balance(user.as_str())
            .await?
            .ok_or_else(|| LedgerError::Database(format!("No token balance for user {user}")))
    }

    /// Balance row guaranteed to exist and to be rolled over.
    async fn current(&self, user: &UserId) -> Result<TokenBalance, LedgerError> {
        match self.store.get_token_balance(user.as_str()).await? {
            Some(balance) if balance.reset_date > Utc::now() => Ok(balance),
            Some(_) => {
                self.reset_if_due(user).await?;
                self.read(user).await
            }
            None => Ok(self.initialize(user).await?.balance),
        }
    }

    async fn apply_reset(
        &self,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> Result<bool, LedgerError> {
        let allowance = self.allowance(user).await?;
        let applied = self
            .store
            .set_token_balance(user.as_str(), allowance, next_reset_date(now), Some(now))
            .await?;

        if applied {
            self.store
                .record_token_transaction(
                    user.as_str(),
                    allowance,
                    TransactionType::MonthlyReset,
                    None,
                )
                .await;
            info!(user_id = %user, allowance, "Monthly token reset applied");
        }
        Ok(applied)
    }
}

#[async_trait::async_trait]
impl TokenLedger for SeaOrmTokenLedger {
    async fn balance(&self, user: &UserId) -> Result<TokenBalance, LedgerError> {
        self.current(user).await
    }

    async fn check(&self, user: &UserId, cost: i32) -> Result<TokenBalance, LedgerError> {
        let balance = self.current(user).await?;
        if balance.tokens_remaining < cost {
            return Err(LedgerError::insufficient(cost, balance.tokens_remaining));
        }
        Ok(balance)
    }

    async fn debit(
        &self,
        user: &UserId,
        cost: i32,
        kind: TransactionType,
        content_id: Option<&str>,
    ) -> Result<TokenBalance, LedgerError> {
        if cost <= 0 {
            return Err(LedgerError::InvalidAmount(cost));
        }

        // Creates the row and applies a due reset before charging.
        self.current(user).await?;

        if !self.store.debit_tokens(user.as_str(), cost).await? {
            let available = self.read(user).await?.tokens_remaining;
            debug!(user_id = %user, cost, available, "Debit rejected");
            return Err(LedgerError::insufficient(cost, available));
        }

        self.store
            .record_token_transaction(user.as_str(), cost, kind, content_id)
            .await;
        metrics::counter!("tokens_debited_total", "transaction_type" => kind.as_str())
            .increment(u64::try_from(cost).unwrap_or_default());

        let balance = self.read(user).await?;
        info!(
            user_id = %user,
            cost,
            transaction_type = %kind,
            remaining = balance.tokens_remaining,
            "Tokens debited"
        );
        Ok(balance)
    }

    async fn refund(
        &self,
        user: &UserId,
        amount: i32,
        content_id: Option<&str>,
    ) -> Result<TokenBalance, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        if !self.store.credit_tokens(user.as_str(), amount).await? {
            return Err(LedgerError::Database(format!(
                "No token balance to refund for user {user}"
            )));
        }

        self.store
            .record_token_transaction(user.as_str(), amount, TransactionType::Refund, content_id)
            .await;
        metrics::counter!("tokens_refunded_total")
            .increment(u64::try_from(amount).unwrap_or_default());

        warn!(user_id = %user, amount, "Tokens refunded after failed generation");
        self.read(user).await
    }

    async fn initialize(&self, user: &UserId) -> Result<LedgerInit, LedgerError> {
        if let Some(balance) = self.store.get_token_balance(user.as_str()).await? {
            return Ok(LedgerInit {
                balance,
                created: false,
            });
        }

        let allowance = self.allowance(user).await?;
        let created = self
            .store
            .insert_token_balance(user.as_str(), allowance, next_reset_date(Utc::now()))
            .await?;

        if created {
            self.store
                .record_token_transaction(
                    user.as_str(),
                    allowance,
                    TransactionType::AccountInitialization,
                    None,
                )
                .await;
            info!(user_id = %user, allowance, "Token balance initialized");
        }

        Ok(LedgerInit {
            balance: self.read(user).await?,
            created,
        })
    }

    async fn reset_if_due(&self, user: &UserId) -> Result<bool, LedgerError> {
        let now = Utc::now();
        match self.store.get_token_balance(user.as_str()).await? {
            Some(balance) if balance.reset_date <= now => self.apply_reset(user, now).await,
            _ => Ok(false),
        }
    }

    async fn reset_all_due(&self, now: DateTime<Utc>) -> Result<u64, LedgerError> {
        let due = self.store.list_balances_due(now).await?;
        let mut applied = 0;

        for balance in due {
            let user = UserId::new(balance.user_id);
            match self.apply_reset(&user, now).await {
                Ok(true) => applied += 1,
                Ok(false) => {}
                Err(e) => warn!(user_id = %user, error = %e, "Monthly reset failed"),
            }
        }

        Ok(applied)
    }

    async fn grant(
        &self,
        user: &UserId,
        tier: SubscriptionTier,
        kind: TransactionType,
    ) -> Result<TokenBalance, LedgerError> {
        let allowance = self.config.allowance_for(tier);
        let reset_date = next_reset_date(Utc::now());

        let created = self
            .store
            .insert_token_balance(user.as_str(), allowance, reset_date)
            .await?;
        if !created {
            self.store
                .set_token_balance(user.as_str(), allowance, reset_date, None)
                .await?;
        }

        self.store
            .record_token_transaction(user.as_str(), allowance, kind, None)
            .await;
        info!(user_id = %user, %tier, allowance, "Token allowance granted");

        self.read(user).await
    }

    async fn history(
        &self,
        user: &UserId,
        limit: u64,
    ) -> Result<Vec<TokenTransaction>, LedgerError> {
        Ok(self.store.token_history(user.as_str(), limit).await?)
    }
}
