use crate::clients::stripe::{
    self, BillingProvider, CheckoutRequest, StripeSubscription, WebhookEvent,
};
use crate::config::StripeConfig;
use crate::db::{Store, SubscriptionChange, UserSubscription};
use crate::domain::{SubscriptionTier, TransactionType, UserId};
use crate::services::subscription_service::{
    AccountState, CancelOutcome, CheckoutOutcome, PaymentRecord, SubscriptionError,
    SubscriptionService, WebhookOutcome,
};
use crate::services::token_ledger::TokenLedger;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

const INVOICE_HISTORY_LIMIT: u32 = 24;

#[derive(Debug, Default, Deserialize)]
struct CheckoutSessionObject {
    #[serde(default)]
    client_reference_id: Option<String>,
    #[serde(default)]
    customer: Option<String>,
    #[serde(default)]
    subscription: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct InvoiceObject {
    #[serde(default)]
    customer: Option<String>,
    #[serde(default)]
    subscription: Option<String>,
    #[serde(default)]
    billing_reason: Option<String>,
}

fn timestamp(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|s| DateTime::from_timestamp(s, 0))
}

fn billing_error(err: &anyhow::Error) -> SubscriptionError {
    SubscriptionError::Billing(format!("{err:#}"))
}

pub struct SeaOrmSubscriptionService {
    store: Arc<Store>,
    ledger: Arc<dyn TokenLedger>,
    billing: Arc<dyn BillingProvider>,
    config: StripeConfig,
    site_url: String,
}

impl SeaOrmSubscriptionService {
    #[must_use]
    pub fn new(
        store: Arc<Store>,
        ledger: Arc<dyn TokenLedger>,
        billing: Arc<dyn BillingProvider>,
        config: StripeConfig,
        site_url: &str,
    ) -> Self {
        Self {
            store,
            ledger,
            billing,
            config,
            site_url: site_url.trim_end_matches('/').to_string(),
        }
    }

    fn ensure_configured(&self) -> Result<(), SubscriptionError> {
        if self.config.is_configured() {
            Ok(())
        } else {
            Err(SubscriptionError::NotConfigured)
        }
    }

    /// Resolves the owner of a billing object: explicit metadata first, then
    /// the stored customer id.
    async fn resolve_user(
        &self,
        metadata_user: Option<&str>,
        customer: Option<&str>,
    ) -> Result<Option<UserId>, SubscriptionError> {
        if let Some(user) = metadata_user.filter(|u| !u.is_empty()) {
            return Ok(Some(UserId::new(user)));
        }
        if let Some(customer) = customer {
            let row = self.store.get_subscription_by_customer(customer).await?;
            return Ok(row.map(|s| UserId::new(s.user_id)));
        }
        Ok(None)
    }

    fn tier_from_subscription(&self, subscription: &StripeSubscription) -> Option<SubscriptionTier> {
        subscription
            .price_id()
            .and_then(|price| self.config.tier_for_price(price))
            .or_else(|| {
                subscription
                    .metadata
                    .get("tier")
                    .and_then(|t| t.parse().ok())
            })
    }

    async fn on_checkout_completed(
        &self,
        object: serde_json::Value,
    ) -> Result<bool, SubscriptionError> {
        let session: CheckoutSessionObject = serde_json::from_value(object)
            .map_err(|e| SubscriptionError::InvalidPayload(e.to_string()))?;

        let metadata_user = session
            .metadata
            .get("user_id")
            .map(String::as_str)
            .or(session.client_reference_id.as_deref());
        let Some(user) = self
            .resolve_user(metadata_user, session.customer.as_deref())
            .await?
        else {
            warn!(customer = ?session.customer, "Checkout completed for unknown user");
            return Ok(false);
        };

        let mut tier = session.metadata.get("tier").and_then(|t| t.parse().ok());
        let mut period_end = None;
        if let Some(subscription_id) = session.subscription.as_deref() {
            match self.billing.retrieve_subscription(subscription_id).await {
                Ok(subscription) => {
                    period_end = timestamp(subscription.period_end());
                    tier = tier.or_else(|| self.tier_from_subscription(&subscription));
                }
                Err(e) => warn!(
                    subscription_id,
                    error = %e,
                    "Could not load subscription for completed checkout"
                ),
            }
        }

        let Some(tier) = tier.filter(SubscriptionTier::is_paid) else {
            warn!(user_id = %user, "Checkout completed without a recognizable paid tier");
            return Ok(false);
        };

        self.store
            .upsert_subscription(
                user.as_str(),
                SubscriptionChange {
                    tier: Some(tier),
                    is_active: Some(true),
                    stripe_customer_id: session.customer,
                    stripe_subscription_id: session.subscription.map(Some),
                    cancel_at_period_end: Some(false),
                    subscription_start_date: Some(Utc::now()),
                    subscription_end_date: period_end,
                },
            )
            .await?;

        self.ledger
            .grant(&user, tier, TransactionType::SubscriptionGrant)
            .await?;

        info!(user_id = %user, %tier, "Subscription activated from checkout");
        Ok(true)
    }

    async fn on_subscription_changed(
        &self,
        object: serde_json::Value,
    ) -> Result<bool, SubscriptionError> {
        let subscription: StripeSubscription = serde_json::from_value(object)
            .map_err(|e| SubscriptionError::InvalidPayload(e.to_string()))?;

        let Some(user) = self
            .resolve_user(
                subscription.metadata.get("user_id").map(String::as_str),
                Some(subscription.customer.as_str()),
            )
            .await?
        else {
            warn!(subscription_id = %subscription.id, "Subscription event for unknown user");
            return Ok(false);
        };

        let previous = self.store.get_subscription(user.as_str()).await?;
        if is_superseded(previous.as_ref(), &subscription.id) {
            warn!(
                user_id = %user,
                subscription_id = %subscription.id,
                "Ignoring update for a subscription that is no longer current"
            );
            return Ok(false);
        }
        let tier = self.tier_from_subscription(&subscription);
        let active = subscription.is_active();

        if subscription.cancel_at_period_end {
            info!(
                user_id = %user,
                subscription_id = %subscription.id,
                "Subscription scheduled to cancel at period end"
            );
        }

        self.store
            .upsert_subscription(
                user.as_str(),
                SubscriptionChange {
                    tier,
                    is_active: Some(active),
                    stripe_customer_id: Some(subscription.customer.clone()),
                    stripe_subscription_id: Some(Some(subscription.id.clone())),
                    cancel_at_period_end: Some(subscription.cancel_at_period_end),
                    subscription_start_date: timestamp(subscription.current_period_start)
                        .filter(|_| previous.is_none()),
                    subscription_end_date: timestamp(subscription.period_end()),
                },
            )
            .await?;

        // Plan change while active: the new tier's allowance applies now.
        let previous_tier = previous.as_ref().map(UserSubscription::effective_tier);
        if let Some(tier) = tier.filter(|t| active && t.is_paid() && previous_tier != Some(*t)) {
            self.ledger
                .grant(&user, tier, TransactionType::SubscriptionGrant)
                .await?;
        }

        info!(
            user_id = %user,
            status = %subscription.status,
            tier = ?tier,
            "Subscription updated"
        );
        Ok(true)
    }

    async fn on_subscription_deleted(
        &self,
        object: serde_json::Value,
    ) -> Result<bool, SubscriptionError> {
        let subscription: StripeSubscription = serde_json::from_value(object)
            .map_err(|e| SubscriptionError::InvalidPayload(e.to_string()))?;

        let Some(user) = self
            .resolve_user(
                subscription.metadata.get("user_id").map(String::as_str),
                Some(subscription.customer.as_str()),
            )
            .await?
        else {
            warn!(subscription_id = %subscription.id, "Deletion event for unknown user");
            return Ok(false);
        };

        let current = self.store.get_subscription(user.as_str()).await?;
        if is_superseded(current.as_ref(), &subscription.id) {
            warn!(
                user_id = %user,
                subscription_id = %subscription.id,
                "Ignoring deletion of a subscription that is no longer current"
            );
            return Ok(false);
        }

        let ended = timestamp(subscription.ended_at.or(subscription.period_end()))
            .unwrap_or_else(Utc::now);

        self.store
            .update_subscription(
                user.as_str(),
                SubscriptionChange {
                    tier: Some(SubscriptionTier::Free),
                    is_active: Some(false),
                    stripe_subscription_id: Some(None),
                    cancel_at_period_end: Some(false),
                    subscription_end_date: Some(ended),
                    ..Default::default()
                },
            )
            .await?;

        info!(user_id = %user, "Subscription ended, user moved to FREE");
        Ok(true)
    }

    async fn on_invoice_paid(&self, object: serde_json::Value) -> Result<bool, SubscriptionError> {
        let invoice: InvoiceObject = serde_json::from_value(object)
            .map_err(|e| SubscriptionError::InvalidPayload(e.to_string()))?;

        if invoice.billing_reason.as_deref() != Some("subscription_cycle") {
            return Ok(false);
        }

        let Some(user) = self.resolve_user(None, invoice.customer.as_deref()).await? else {
            warn!(customer = ?invoice.customer, "Renewal invoice for unknown customer");
            return Ok(false);
        };

        let Some(current) = self.store.get_subscription(user.as_str()).await? else {
            return Ok(false);
        };
        let tier = current.effective_tier();
        if !tier.is_paid() {
            return Ok(false);
        }

        self.ledger
            .grant(&user, tier, TransactionType::SubscriptionGrant)
            .await?;
        info!(
            user_id = %user,
            %tier,
            subscription_id = ?invoice.subscription,
            "Renewal allowance granted"
        );
        Ok(true)
    }
}

/// True when the row already tracks a different subscription, so an event
/// for `event_subscription` is about an older one.
fn is_superseded(row: Option<&UserSubscription>, event_subscription: &str) -> bool {
    row.and_then(|r| r.stripe_subscription_id.as_deref())
        .is_some_and(|current| current != event_subscription)
}

#[async_trait::async_trait]
impl SubscriptionService for SeaOrmSubscriptionService {
    async fn get(&self, user: &UserId) -> Result<UserSubscription, SubscriptionError> {
        Ok(self
            .store
            .get_subscription(user.as_str())
            .await?
            .unwrap_or_else(|| UserSubscription::implicit_free(user.as_str())))
    }

    async fn create_checkout(
        &self,
        user: &UserId,
        email: Option<&str>,
        tier: SubscriptionTier,
    ) -> Result<CheckoutOutcome, SubscriptionError> {
        if !tier.is_paid() {
            return Err(SubscriptionError::InvalidTier(tier));
        }
        self.ensure_configured()?;
        let price_id = self
            .config
            .price_id_for(tier)
            .ok_or(SubscriptionError::PriceNotConfigured(tier))?
            .to_string();

        self.store.insert_default_subscription(user.as_str()).await?;
        let existing = self.store.get_subscription(user.as_str()).await?;
        if let Some(current) = existing
            .as_ref()
            .map(UserSubscription::effective_tier)
            .filter(|t| t.is_paid())
        {
            return Err(SubscriptionError::AlreadySubscribed(current));
        }

        let customer_id = match existing.and_then(|s| s.stripe_customer_id) {
            Some(id) => id,
            None => {
                let id = self
                    .billing
                    .create_customer(user.as_str(), email)
                    .await
                    .map_err(|e| billing_error(&e))?;
                self.store
                    .update_subscription(
                        user.as_str(),
                        SubscriptionChange {
                            stripe_customer_id: Some(id.clone()),
                            ..Default::default()
                        },
                    )
                    .await?;
                id
            }
        };

        let request = CheckoutRequest {
            customer_id,
            price_id,
            user_id: user.to_string(),
            tier: tier.as_str().to_string(),
            success_url: format!(
                "{}/dashboard?checkout=success&session_id={{CHECKOUT_SESSION_ID}}",
                self.site_url
            ),
            cancel_url: format!("{}/pricing?checkout=cancelled", self.site_url),
        };

        let session = self
            .billing
            .create_checkout_session(&request)
            .await
            .map_err(|e| billing_error(&e))?;
        let url = session
            .url
            .ok_or_else(|| SubscriptionError::Billing("Checkout session has no URL".into()))?;

        info!(user_id = %user, %tier, session_id = %session.id, "Checkout session created");
        Ok(CheckoutOutcome {
            session_id: session.id,
            url,
        })
    }

    async fn cancel(&self, user: &UserId) -> Result<CancelOutcome, SubscriptionError> {
        let subscription_id = self
            .store
            .get_subscription(user.as_str())
            .await?
            .and_then(|s| s.stripe_subscription_id)
            .ok_or(SubscriptionError::NoActiveSubscription)?;
        self.ensure_configured()?;

        let updated = self
            .billing
            .schedule_cancellation(&subscription_id)
            .await
            .map_err(|e| billing_error(&e))?;
        let cancel_date = timestamp(updated.period_end());

        self.store
            .update_subscription(
                user.as_str(),
                SubscriptionChange {
                    cancel_at_period_end: Some(true),
                    subscription_end_date: cancel_date,
                    ..Default::default()
                },
            )
            .await?;

        info!(user_id = %user, %subscription_id, ?cancel_date, "Cancellation scheduled");
        Ok(CancelOutcome {
            subscription_id,
            cancel_date,
        })
    }

    async fn create_portal_session(&self, user: &UserId) -> Result<String, SubscriptionError> {
        let customer_id = self
            .store
            .get_subscription(user.as_str())
            .await?
            .and_then(|s| s.stripe_customer_id)
            .ok_or(SubscriptionError::CustomerNotFound)?;
        self.ensure_configured()?;

        let return_url = format!("{}/dashboard/billing", self.site_url);
        self.billing
            .create_portal_session(&customer_id, &return_url)
            .await
            .map_err(|e| billing_error(&e))
    }

    async fn payment_history(
        &self,
        user: &UserId,
    ) -> Result<Vec<PaymentRecord>, SubscriptionError> {
        let Some(customer_id) = self
            .store
            .get_subscription(user.as_str())
            .await?
            .and_then(|s| s.stripe_customer_id)
        else {
            return Ok(Vec::new());
        };
        self.ensure_configured()?;

        let invoices = self
            .billing
            .list_invoices(&customer_id, INVOICE_HISTORY_LIMIT)
            .await
            .map_err(|e| billing_error(&e))?;

        Ok(invoices
            .into_iter()
            .map(|invoice| PaymentRecord {
                id: invoice.id,
                number: invoice.number,
                amount: if invoice.amount_paid > 0 {
                    invoice.amount_paid
                } else {
                    invoice.amount_due
                },
                currency: invoice.currency,
                status: invoice.status,
                created: timestamp(Some(invoice.created)),
                hosted_invoice_url: invoice.hosted_invoice_url,
                invoice_pdf: invoice.invoice_pdf,
            })
            .collect())
    }

    async fn handle_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookOutcome, SubscriptionError> {
        if self.config.webhook_secret.is_empty() {
            return Err(SubscriptionError::NotConfigured);
        }

        stripe::verify_signature(
            payload,
            signature,
            &self.config.webhook_secret,
            self.config.webhook_tolerance_seconds,
            Utc::now().timestamp(),
        )
        .map_err(|e| SubscriptionError::InvalidSignature(e.to_string()))?;

        let event: WebhookEvent = serde_json::from_slice(payload)
            .map_err(|e| SubscriptionError::InvalidPayload(e.to_string()))?;

        let object = event.data.object;
        let handled = match event.event_type.as_str() {
            "checkout.session.completed" => self.on_checkout_completed(object).await?,
            "customer.subscription.created" | "customer.subscription.updated" => {
                self.on_subscription_changed(object).await?
            }
            "customer.subscription.deleted" => self.on_subscription_deleted(object).await?,
            "invoice.payment_succeeded" => self.on_invoice_paid(object).await?,
            _ => false,
        };

        metrics::counter!("stripe_webhooks_total", "event_type" => event.event_type.clone())
            .increment(1);
        info!(
            event_id = %event.id,
            event_type = %event.event_type,
            handled,
            "Webhook processed"
        );

        Ok(WebhookOutcome {
            event_id: event.id,
            event_type: event.event_type,
            handled,
        })
    }

    async fn repair(
        &self,
        user: &UserId,
        tier: SubscriptionTier,
    ) -> Result<AccountState, SubscriptionError> {
        let existed = self.store.get_subscription(user.as_str()).await?.is_some();

        let subscription = self
            .store
            .upsert_subscription(
                user.as_str(),
                SubscriptionChange {
                    tier: Some(tier),
                    is_active: Some(true),
                    ..Default::default()
                },
            )
            .await?;
        let tokens = self
            .ledger
            .grant(user, tier, TransactionType::AdminAdjustment)
            .await?;

        warn!(user_id = %user, %tier, "Subscription repaired");
        Ok(AccountState {
            subscription,
            tokens,
            created: !existed,
        })
    }

    async fn initialize(&self, user: &UserId) -> Result<AccountState, SubscriptionError> {
        let subscription_created = self.store.insert_default_subscription(user.as_str()).await?;
        let init = self.ledger.initialize(user).await?;
        let subscription = self.get(user).await?;

        Ok(AccountState {
            subscription,
            tokens: init.balance,
            created: subscription_created || init.created,
        })
    }
}
