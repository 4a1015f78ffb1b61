//! Prepaid credit ledger.
//!
//! Every generation request is paid for up front. The balance lives in
//! `token_usage`; every movement also appends a row to `token_transactions`.
//! In that log `tokens_used` is positive for debits and negative for credits.

use crate::db::{TokenBalance, TokenTransaction};
use crate::domain::{SubscriptionTier, TransactionType, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Insufficient tokens: {required} required, {available} available")]
    InsufficientBalance {
        required: i32,
        available: i32,
        shortfall: i32,
    },

    #[error("Invalid token amount: {0}")]
    InvalidAmount(i32),

    #[error("Database error: {0}")]
    Database(String),
}

impl LedgerError {
    #[must_use]
    pub const fn insufficient(required: i32, available: i32) -> Self {
        Self::InsufficientBalance {
            required,
            available,
            shortfall: required - available,
        }
    }
}

impl From<sea_orm::DbErr> for LedgerError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for LedgerError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(format!("{err:#}"))
    }
}

/// Result of [`TokenLedger::initialize`].
#[derive(Debug, Clone, Serialize)]
pub struct LedgerInit {
    pub balance: TokenBalance,
    /// `false` when the row already existed and was returned unchanged.
    pub created: bool,
}

/// Per-user credit accounting.
///
/// # Examples
///
/// ```rust,ignore
/// use repurposely::domain::{TransactionType, UserId};
/// use repurposely::services::{LedgerError, TokenLedger};
///
/// async fn charge(ledger: &dyn TokenLedger, user: &UserId) -> Result<i32, LedgerError> {
///     let balance = ledger
///         .debit(user, 10, TransactionType::ImageGeneration, None)
///         .await?;
///     Ok(balance.tokens_remaining)
/// }
/// ```
#[async_trait::async_trait]
pub trait TokenLedger: Send + Sync {
    /// Current balance. Creates the row on first access and applies a due
    /// monthly reset first.
    async fn balance(&self, user: &UserId) -> Result<TokenBalance, LedgerError>;

    /// Verifies that `cost` is covered without changing anything.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientBalance`] with the shortfall.
    async fn check(&self, user: &UserId, cost: i32) -> Result<TokenBalance, LedgerError>;

    /// Removes `cost` credits in one conditional statement, then appends an
    /// audit row. A rejected debit leaves the balance untouched.
    ///
    /// # Errors
    ///
    /// - Returns [`LedgerError::InsufficientBalance`] when the balance is short
    /// - Returns [`LedgerError::InvalidAmount`] for a non-positive cost
    async fn debit(
        &self,
        user: &UserId,
        cost: i32,
        kind: TransactionType,
        content_id: Option<&str>,
    ) -> Result<TokenBalance, LedgerError>;

    /// Returns credits taken by a debit whose paid call then failed.
    async fn refund(
        &self,
        user: &UserId,
        amount: i32,
        content_id: Option<&str>,
    ) -> Result<TokenBalance, LedgerError>;

    /// Idempotent creation of the balance row, seeded from the user's tier.
    async fn initialize(&self, user: &UserId) -> Result<LedgerInit, LedgerError>;

    /// Applies the monthly rollover for one user if it is due.
    async fn reset_if_due(&self, user: &UserId) -> Result<bool, LedgerError>;

    /// Applies every rollover due at `now`. Returns how many were applied.
    async fn reset_all_due(&self, now: DateTime<Utc>) -> Result<u64, LedgerError>;

    /// Sets the balance to `tier`'s allowance and records `kind`.
    async fn grant(
        &self,
        user: &UserId,
        tier: SubscriptionTier,
        kind: TransactionType,
    ) -> Result<TokenBalance, LedgerError>;

    /// Most recent transactions first.
    async fn history(&self, user: &UserId, limit: u64)
    -> Result<Vec<TokenTransaction>, LedgerError>;
}
