pub mod prelude;

pub mod content_history;
pub mod token_transactions;
pub mod token_usage;
pub mod user_subscriptions;
