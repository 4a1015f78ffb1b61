//! External collaborators. Each concern is a trait so the services can run
//! against in-process fakes; the structs here are the production HTTP
//! implementations.

pub mod anthropic;
pub mod auth;
pub mod openai;
pub mod stripe;
pub mod youtube;

pub use anthropic::{AnthropicClient, TextGenerator, TextRequest};
pub use auth::{AuthProvider, AuthenticatedUser, SupabaseAuthClient};
pub use openai::{
    AudioUpload, GeneratedImage, ImageGenerator, ImageRequest, OpenAiClient, Transcriber,
};
pub use stripe::{BillingProvider, StripeClient};
pub use youtube::{TranscriptFetcher, YoutubeTranscriptClient};
