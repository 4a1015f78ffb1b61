//! Keeps `user_subscriptions` consistent with the billing provider.
//!
//! Plan changes arrive asynchronously through signed webhooks; the
//! synchronous operations here only start flows (checkout, portal,
//! cancellation) or repair local state.

use crate::db::{TokenBalance, UserSubscription};
use crate::domain::{SubscriptionTier, UserId};
use crate::services::token_ledger::LedgerError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("No active subscription to cancel")]
    NoActiveSubscription,

    #[error("No billing customer on file")]
    CustomerNotFound,

    #[error("Billing is not configured")]
    NotConfigured,

    #[error("Tier {0} cannot be purchased")]
    InvalidTier(SubscriptionTier),

    #[error("Already subscribed to {0}; manage the plan from the billing portal")]
    AlreadySubscribed(SubscriptionTier),

    #[error("No price configured for tier {0}")]
    PriceNotConfigured(SubscriptionTier),

    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("Billing provider error: {0}")]
    Billing(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sea_orm::DbErr> for SubscriptionError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for SubscriptionError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(format!("{err:#}"))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutOutcome {
    pub session_id: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOutcome {
    pub subscription_id: String,
    /// When access ends; `None` if the provider did not report a period end.
    pub cancel_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PaymentRecord {
    pub id: String,
    pub number: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub status: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub hosted_invoice_url: Option<String>,
    pub invoice_pdf: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebhookOutcome {
    pub event_id: String,
    pub event_type: String,
    /// `false` for events that were acknowledged but not acted on.
    pub handled: bool,
}

/// Subscription and token rows after a repair or initialization.
#[derive(Debug, Clone, Serialize)]
pub struct AccountState {
    pub subscription: UserSubscription,
    pub tokens: TokenBalance,
    pub created: bool,
}

#[async_trait::async_trait]
pub trait SubscriptionService: Send + Sync {
    /// Stored subscription, or the implicit FREE plan.
    async fn get(&self, user: &UserId) -> Result<UserSubscription, SubscriptionError>;

    /// Starts a hosted checkout for `tier`, creating the billing customer on
    /// first use.
    ///
    /// # Errors
    ///
    /// - [`SubscriptionError::InvalidTier`] for FREE
    /// - [`SubscriptionError::AlreadySubscribed`] while a paid plan is active
    /// - [`SubscriptionError::PriceNotConfigured`] when the tier has no price
    async fn create_checkout(
        &self,
        user: &UserId,
        email: Option<&str>,
        tier: SubscriptionTier,
    ) -> Result<CheckoutOutcome, SubscriptionError>;

    /// Schedules cancellation at the end of the current period. The local
    /// row stays active until the provider reports the deletion.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::NoActiveSubscription`], without calling
    /// the provider, when no subscription id is on file.
    async fn cancel(&self, user: &UserId) -> Result<CancelOutcome, SubscriptionError>;

    /// # Errors
    ///
    /// Returns [`SubscriptionError::CustomerNotFound`], without calling the
    /// provider, when no customer id is on file.
    async fn create_portal_session(&self, user: &UserId) -> Result<String, SubscriptionError>;

    async fn payment_history(&self, user: &UserId)
    -> Result<Vec<PaymentRecord>, SubscriptionError>;

    /// Verifies and applies one webhook delivery.
    async fn handle_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookOutcome, SubscriptionError>;

    /// Forces the user onto `tier` (active) with that tier's allowance.
    async fn repair(
        &self,
        user: &UserId,
        tier: SubscriptionTier,
    ) -> Result<AccountState, SubscriptionError>;

    /// Creates FREE defaults for a user without rows; returns existing rows
    /// unchanged otherwise.
    async fn initialize(&self, user: &UserId) -> Result<AccountState, SubscriptionError>;
}
