use std::sync::Arc;

use crate::clients::{
    AnthropicClient, AuthProvider, BillingProvider, OpenAiClient, StripeClient,
    SupabaseAuthClient, YoutubeTranscriptClient,
};
use crate::config::Config;
use crate::db::Store;
use crate::services::{
    AccountService, ContentService, DefaultAccountService, DefaultGenerationService,
    GenerationProviders, GenerationService, SeaOrmContentService, SeaOrmSubscriptionService,
    SeaOrmTokenLedger, SubscriptionService, TokenLedger,
};

/// External collaborators, injected so tests can swap in fakes.
#[derive(Clone)]
pub struct Providers {
    pub auth: Arc<dyn AuthProvider>,
    pub billing: Arc<dyn BillingProvider>,
    pub generation: GenerationProviders,
}

impl Providers {
    /// HTTP implementations configured from `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let openai = Arc::new(OpenAiClient::new(&config.generation)?);

        Ok(Self {
            auth: Arc::new(SupabaseAuthClient::new(&config.auth)?),
            billing: Arc::new(StripeClient::new(&config.stripe)?),
            generation: GenerationProviders {
                text: Arc::new(AnthropicClient::new(&config.generation)?),
                images: openai.clone(),
                transcriber: openai,
                transcripts: Arc::new(YoutubeTranscriptClient::new()?),
            },
        })
    }
}

/// Application-scoped services shared by the HTTP layer, the CLI and the
/// scheduler. Nothing here holds per-user mutable state.
#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Arc<Store>,

    pub auth: Arc<dyn AuthProvider>,

    pub ledger: Arc<dyn TokenLedger>,

    pub subscriptions: Arc<dyn SubscriptionService>,

    pub generation: Arc<dyn GenerationService>,

    pub content: Arc<dyn ContentService>,

    pub accounts: Arc<dyn AccountService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_url,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;
        let providers = Providers::from_config(&config)?;
        Ok(Self::with_providers(config, store, providers))
    }

    #[must_use]
    pub fn with_providers(config: Config, store: Store, providers: Providers) -> Self {
        let store = Arc::new(store);

        let ledger: Arc<dyn TokenLedger> = Arc::new(SeaOrmTokenLedger::new(
            Arc::clone(&store),
            config.tokens.clone(),
        ));

        let subscriptions: Arc<dyn SubscriptionService> = Arc::new(SeaOrmSubscriptionService::new(
            Arc::clone(&store),
            Arc::clone(&ledger),
            Arc::clone(&providers.billing),
            config.stripe.clone(),
            &config.server.site_url,
        ));

        let generation: Arc<dyn GenerationService> = Arc::new(DefaultGenerationService::new(
            Arc::clone(&store),
            Arc::clone(&ledger),
            providers.generation,
            config.generation.clone(),
            config.tokens.clone(),
        ));

        let content: Arc<dyn ContentService> =
            Arc::new(SeaOrmContentService::new(Arc::clone(&store)));

        let accounts: Arc<dyn AccountService> = Arc::new(DefaultAccountService::new(
            Arc::clone(&store),
            Arc::clone(&ledger),
            Arc::clone(&subscriptions),
            Arc::clone(&providers.billing),
            Arc::clone(&providers.auth),
        ));

        Self {
            config: Arc::new(config),
            store,
            auth: providers.auth,
            ledger,
            subscriptions,
            generation,
            content,
            accounts,
        }
    }
}
