use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::config::Config;
use crate::state::SharedState;

mod admin;
pub mod auth;
mod billing;
mod content;
mod error;
mod generation;
mod health;
mod observability;
mod tokens;
mod types;
mod user;
mod validation;

pub use auth::{AuthError, CurrentUser};
pub use error::ApiError;
pub use types::*;

use metrics_exporter_prometheus::PrometheusHandle;

/// Multipart framing on top of the raw upload limit.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

pub fn router(state: Arc<AppState>) -> Router {
    let config = state.config();
    let cors_origins = config.server.cors_allowed_origins.clone();

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(config.server.secure_cookies)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            config.server.session_timeout_minutes,
        )));

    let protected_routes = create_protected_router(state.clone());

    let api_router = Router::new()
        .merge(protected_routes)
        .route("/health", get(health::health))
        .route("/stripe/webhook", post(billing::webhook))
        .route("/auth/session", post(auth::create_session))
        .route("/auth/logout", post(auth::logout))
        .layer(session_layer)
        .with_state(state);

    let cors_layer = if cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(middleware::from_fn(observability::security_headers_middleware))
        .layer(middleware::from_fn(observability::logging_middleware))
        .layer(TraceLayer::new_for_http())
}

fn create_protected_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let upload_limit = state.config().generation.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/repurpose", post(generation::repurpose))
        .route("/generate-image", post(generation::generate_image))
        .route(
            "/transcribe",
            post(generation::transcribe).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/youtube-transcript", post(generation::youtube_transcript))
        .route("/tokens", get(tokens::get_tokens))
        .route("/tokens/history", get(tokens::get_history))
        .route("/init-tokens", post(tokens::init_tokens))
        .route(
            "/token-debug",
            get(tokens::token_debug).post(tokens::token_debug_repair),
        )
        .route("/stripe/create-checkout", post(billing::create_checkout))
        .route(
            "/stripe/cancel-subscription",
            post(billing::cancel_subscription),
        )
        .route("/stripe/create-portal", post(billing::create_portal))
        .route("/stripe/payment-history", get(billing::payment_history))
        .route("/subscription", get(billing::get_subscription))
        .route("/content", get(content::list_content))
        .route("/content/{id}", get(content::get_content))
        .route("/content/update", post(content::update_content))
        .route("/content/update-status", post(content::update_status))
        .route("/content/delete", post(content::delete_content))
        .route("/user/profile", get(user::profile))
        .route("/user/delete", post(user::delete_account))
        .route("/fix-subscription", get(admin::fix_subscription))
        .route("/metrics", get(observability::get_metrics))
        .route_layer(middleware::from_fn_with_state(state, auth::auth_middleware))
}
