use std::sync::Arc;

use crate::config::Config;
use crate::db::Store;
use crate::scheduler::TokenResetScheduler;
use crate::services::SeaOrmTokenLedger;

pub async fn cmd_reset_tokens(config: &Config) -> anyhow::Result<()> {
    let store = Arc::new(Store::new(&config.general.database_url).await?);
    let ledger = Arc::new(SeaOrmTokenLedger::new(store, config.tokens.clone()));
    let scheduler = TokenResetScheduler::new(ledger, config.tokens.clone());

    let applied = scheduler.run_once().await?;
    if applied == 0 {
        println!("No balances were due for a reset.");
    } else {
        println!("Reset {applied} balance(s).");
    }
    Ok(())
}
