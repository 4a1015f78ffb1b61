use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::config::TokenConfig;
use crate::services::TokenLedger;

/// Runs the monthly token rollover on a cron schedule. Balances are also
/// rolled over lazily on read, so a missed tick only delays the refill of
/// users that stay idle.
pub struct TokenResetScheduler {
    ledger: Arc<dyn TokenLedger>,
    config: TokenConfig,
}

impl TokenResetScheduler {
    #[must_use]
    pub fn new(ledger: Arc<dyn TokenLedger>, config: TokenConfig) -> Self {
        Self { ledger, config }
    }

    /// Applies every due reset once.
    pub async fn run_once(&self) -> Result<u64> {
        let applied = self.ledger.reset_all_due(Utc::now()).await?;
        info!(applied, "Monthly token reset pass finished");
        Ok(applied)
    }

    /// Starts the cron job. Returns `None` when the job is disabled; keep the
    /// returned scheduler alive for as long as the job should run.
    pub async fn start(&self) -> Result<Option<JobScheduler>> {
        if !self.config.reset_job_enabled {
            info!("Token reset job is disabled in config");
            return Ok(None);
        }

        // Catch up on anything that fell due while the service was down.
        if let Err(e) = self.run_once().await {
            error!("Startup token reset failed: {}", e);
        }

        let sched = JobScheduler::new().await?;
        let ledger = Arc::clone(&self.ledger);

        let job = Job::new_async(self.config.reset_cron.as_str(), move |_uuid, _lock| {
            let ledger = Arc::clone(&ledger);
            Box::pin(async move {
                match ledger.reset_all_due(Utc::now()).await {
                    Ok(applied) => info!(applied, "Scheduled token reset finished"),
                    Err(e) => error!("Scheduled token reset failed: {}", e),
                }
            })
        })?;

        sched.add(job).await?;
        sched.start().await?;

        info!("Token reset scheduler running with cron: {}", self.config.reset_cron);
        Ok(Some(sched))
    }
}
