use std::sync::Arc;

use crate::config::Config;
use crate::domain::{SubscriptionTier, UserId};
use crate::state::SharedState;

pub async fn cmd_fix_subscription(config: Config, user_id: &str, tier: &str) -> anyhow::Result<()> {
    let tier: SubscriptionTier = tier.parse()?;
    let user = UserId::new(user_id.trim());
    if user.as_str().is_empty() {
        anyhow::bail!("User id cannot be empty");
    }

    let state = Arc::new(SharedState::new(config).await?);
    let account = state.subscriptions.repair(&user, tier).await?;

    println!("Subscription repaired for {user}");
    println!("{:-<50}", "");
    println!("  Tier:      {}", account.subscription.subscription_tier);
    println!("  Active:    {}", account.subscription.is_active);
    println!("  Tokens:    {}", account.tokens.tokens_remaining);
    println!("  Resets on: {}", account.tokens.reset_date.format("%Y-%m-%d"));

    Ok(())
}
