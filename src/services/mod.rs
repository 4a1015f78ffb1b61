pub mod token_ledger;
pub mod token_ledger_impl;
pub use token_ledger::{LedgerError, LedgerInit, TokenLedger};
pub use token_ledger_impl::SeaOrmTokenLedger;

pub mod subscription_service;
pub mod subscription_service_impl;
pub use subscription_service::{
    AccountState, CancelOutcome, CheckoutOutcome, PaymentRecord, SubscriptionError,
    SubscriptionService, WebhookOutcome,
};
pub use subscription_service_impl::SeaOrmSubscriptionService;

pub mod prompt;

pub mod generation_service;
pub mod generation_service_impl;
pub use generation_service::{
    GenerationError, GenerationService, ImageGenerationRequest, ImageOutcome, RepurposeOutcome,
    RepurposeRequest, YoutubeTranscript,
};
pub use generation_service_impl::{DefaultGenerationService, GenerationProviders};

pub mod content_service;
pub mod content_service_impl;
pub use content_service::{ContentError, ContentService};
pub use content_service_impl::SeaOrmContentService;

pub mod account_service;
pub mod account_service_impl;
pub use account_service::{AccountDeletion, AccountError, AccountService, Profile};
pub use account_service_impl::DefaultAccountService;
