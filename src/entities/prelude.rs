pub use super::content_history::Entity as ContentHistory;
pub use super::token_transactions::Entity as TokenTransactions;
pub use super::token_usage::Entity as TokenUsage;
pub use super::user_subscriptions::Entity as UserSubscriptions;
