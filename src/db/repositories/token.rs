use crate::domain::TransactionType;
use crate::entities::{prelude::*, token_transactions, token_usage};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict, SimpleExpr};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::Serialize;
use tracing::{debug, warn};

/// Current credit balance of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenBalance {
    pub user_id: String,
    pub tokens_used: i32,
    pub tokens_remaining: i32,
    pub reset_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One row of the append-only ledger log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenTransaction {
    pub id: i32,
    pub user_id: String,
    pub tokens_used: i32,
    pub transaction_type: String,
    pub content_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub struct TokenRepository {
    conn: DatabaseConnection,
}

impl TokenRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_usage(m: token_usage::Model) -> TokenBalance {
        TokenBalance {
            user_id: m.user_id,
            tokens_used: m.tokens_used,
            tokens_remaining: m.tokens_remaining,
            reset_date: m.reset_date,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }

    fn map_transaction(m: token_transactions::Model) -> TokenTransaction {
        TokenTransaction {
            id: m.id,
            user_id: m.user_id,
            tokens_used: m.tokens_used,
            transaction_type: m.transaction_type,
            content_id: m.content_id,
            created_at: m.created_at,
        }
    }

    // ========================================================================
    // Balances
    // ========================================================================

    pub async fn get(&self, user_id: &str) -> Result<Option<TokenBalance>> {
        let row = TokenUsage::find()
            .filter(token_usage::Column::UserId.eq(user_id))
            .one(&self.conn)
            .await
            .context("Failed to query token usage")?;

        Ok(row.map(Self::map_usage))
    }

    /// Creates the balance row unless one exists. Returns whether it was
    /// created by this call.
    pub async fn insert_if_absent(
        &self,
        user_id: &str,
        allowance: i32,
        reset_date: DateTime<Utc>,
    ) -> Result<bool> {
        let now = Utc::now();
        let model = token_usage::ActiveModel {
            user_id: Set(user_id.to_string()),
            tokens_used: Set(0),
            tokens_remaining: Set(allowance),
            reset_date: Set(reset_date),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let inserted = TokenUsage::insert(model)
            .on_conflict(
                OnConflict::column(token_usage::Column::UserId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await
            .context("Failed to insert token usage")?;

        Ok(inserted > 0)
    }

    /// Conditional debit: succeeds only when the stored balance covers
    /// `cost`, in a single statement.
    pub async fn debit(&self, user_id: &str, cost: i32) -> Result<bool> {
        use token_usage::Column;

        let result = TokenUsage::update_many()
            .col_expr(
                Column::TokensRemaining,
                Expr::col(Column::TokensRemaining).sub(cost),
            )
            .col_expr(Column::TokensUsed, Expr::col(Column::TokensUsed).add(cost))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(Column::UserId.eq(user_id))
            .filter(Column::TokensRemaining.gte(cost))
            .exec(&self.conn)
            .await
            .context("Failed to debit tokens")?;

        debug!(user_id, cost, rows = result.rows_affected, "Debit attempted");
        Ok(result.rows_affected == 1)
    }

    /// Gives back `amount` credits. `tokens_used` is floored at zero since a
    /// monthly reset may have happened between debit and credit.
    pub async fn credit(&self, user_id: &str, amount: i32) -> Result<bool> {
        use token_usage::Column;

        let used: SimpleExpr = Expr::case(
            Expr::col(Column::TokensUsed).gte(amount),
            Expr::col(Column::TokensUsed).sub(amount),
        )
        .finally(0)
        .into();

        let result = TokenUsage::update_many()
            .col_expr(
                Column::TokensRemaining,
                Expr::col(Column::TokensRemaining).add(amount),
            )
            .col_expr(Column::TokensUsed, used)
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(Column::UserId.eq(user_id))
            .exec(&self.conn)
            .await
            .context("Failed to credit tokens")?;

        Ok(result.rows_affected == 1)
    }

    /// Overwrites the balance. With `only_if_due` set, the write only happens
    /// when `reset_date <= due_at`, which keeps concurrent resets from
    /// applying twice.
    pub async fn set_balance(
        &self,
        user_id: &str,
        remaining: i32,
        reset_date: DateTime<Utc>,
        only_if_due: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        use token_usage::Column;

        let mut update = TokenUsage::update_many()
            .col_expr(Column::TokensUsed, Expr::value(0))
            .col_expr(Column::TokensRemaining, Expr::value(remaining))
            .col_expr(Column::ResetDate, Expr::value(reset_date))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(Column::UserId.eq(user_id));

        if let Some(due_at) = only_if_due {
            update = update.filter(Column::ResetDate.lte(due_at));
        }

        let result = update
            .exec(&self.conn)
            .await
            .context("Failed to set token balance")?;

        Ok(result.rows_affected == 1)
    }

    pub async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<TokenBalance>> {
        let rows = TokenUsage::find()
            .filter(token_usage::Column::ResetDate.lte(now))
            .order_by_asc(token_usage::Column::ResetDate)
            .all(&self.conn)
            .await
            .context("Failed to list balances due for reset")?;

        Ok(rows.into_iter().map(Self::map_usage).collect())
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Appends an audit row. Debits are stored positive and credits
    /// negative. Failures are logged and swallowed so a committed balance
    /// change is never reported as failed.
    pub async fn record_transaction(
        &self,
        user_id: &str,
        amount: i32,
        kind: TransactionType,
        content_id: Option<&str>,
    ) -> bool {
        let amount = amount.abs();
        let tokens = if kind.is_debit() { amount } else { -amount };
        let model = token_transactions::ActiveModel {
            user_id: Set(user_id.to_string()),
            tokens_used: Set(tokens),
            transaction_type: Set(kind.as_str().to_string()),
            content_id: Set(content_id.map(ToString::to_string)),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        match TokenTransactions::insert(model).exec(&self.conn).await {
            Ok(_) => true,
            Err(e) => {
                warn!(
                    user_id,
                    transaction_type = %kind,
                    error = %e,
                    "Failed to record token transaction"
                );
                false
            }
        }
    }

    pub async fn history(&self, user_id: &str, limit: u64) -> Result<Vec<TokenTransaction>> {
        let rows = TokenTransactions::find()
            .filter(token_transactions::Column::UserId.eq(user_id))
            .order_by_desc(token_transactions::Column::CreatedAt)
            .order_by_desc(token_transactions::Column::Id)
            .limit(limit)
            .all(&self.conn)
            .await
            .context("Failed to query token transactions")?;

        Ok(rows.into_iter().map(Self::map_transaction).collect())
    }
}
