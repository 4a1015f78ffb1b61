use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, Level, field, info_span};
use uuid::Uuid;

use crate::api::AppState;
use crate::domain::UserId;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_REQUEST_ID_LEN: usize = 128;

/// Set on the response by the auth middleware so the request span can carry
/// the caller once the handler has run.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub UserId);

pub async fn get_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.prometheus_handle.as_ref().map_or_else(
        || "Metrics not enabled or failed to initialize".to_string(),
        metrics_exporter_prometheus::PrometheusHandle::render,
    )
}

/// Groups request paths into a small fixed label set.
#[must_use]
pub fn endpoint_family(path: &str) -> &'static str {
    let mut segments = path
        .trim_start_matches('/')
        .trim_start_matches("api/")
        .split('/');

    match (segments.next().unwrap_or_default(), segments.next()) {
        ("repurpose" | "generate-image" | "transcribe" | "youtube-transcript", _) => "generation",
        ("tokens" | "init-tokens" | "token-debug", _) => "tokens",
        ("stripe", Some("webhook")) => "webhook",
        ("stripe" | "subscription", _) => "billing",
        ("content", _) => "content",
        ("user", _) => "account",
        ("auth", _) => "auth",
        ("fix-subscription", _) => "admin",
        ("health", _) => "health",
        ("metrics", _) => "metrics",
        _ => "other",
    }
}

/// Reuses a caller-supplied request id when it is short and printable.
fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| {
            !id.is_empty()
                && id.len() <= MAX_REQUEST_ID_LEN
                && id
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        })
        .map_or_else(|| Uuid::new_v4().to_string(), ToString::to_string)
}

pub async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let request_id = request_id(req.headers());
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let endpoint = endpoint_family(&path);

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %path,
        endpoint,
        user_id = field::Empty,
    );

    async move {
        let mut response = next.run(req).await;

        let elapsed = start.elapsed();
        let status = response.status();

        if let Some(AuthenticatedUser(user)) =
            response.extensions_mut().remove::<AuthenticatedUser>()
        {
            tracing::Span::current().record("user_id", user.as_str());
        }

        let labels = [
            ("method", method),
            ("endpoint", endpoint.to_string()),
            ("status", status.as_u16().to_string()),
        ];
        metrics::counter!("http_requests_total", &labels).increment(1);
        metrics::histogram!("http_request_duration_seconds", &labels)
            .record(elapsed.as_secs_f64());

        let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        if status.is_server_error() {
            tracing::event!(Level::WARN, status = status.as_u16(), duration_ms, "Request failed");
        } else {
            tracing::event!(Level::INFO, status = status.as_u16(), duration_ms, "Request finished");
        }

        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }
    .instrument(span)
    .await
}

/// API responses are never cached.
pub async fn security_headers_middleware(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(header::REFERRER_POLICY, HeaderValue::from_static("no-referrer"));
    headers
        .entry(header::CACHE_CONTROL)
        .or_insert(HeaderValue::from_static("no-store"));

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn families_cover_the_api() {
        assert_eq!(endpoint_family("/api/repurpose"), "generation");
        assert_eq!(endpoint_family("/api/transcribe"), "generation");
        assert_eq!(endpoint_family("/api/tokens/history"), "tokens");
        assert_eq!(endpoint_family("/api/token-debug"), "tokens");
        assert_eq!(endpoint_family("/api/stripe/webhook"), "webhook");
        assert_eq!(endpoint_family("/api/stripe/create-checkout"), "billing");
        assert_eq!(endpoint_family("/api/subscription"), "billing");
        assert_eq!(endpoint_family("/api/content/3f1c"), "content");
        assert_eq!(endpoint_family("/api/user/delete"), "account");
        assert_eq!(endpoint_family("/api/fix-subscription"), "admin");
        assert_eq!(endpoint_family("/favicon.ico"), "other");
    }

    #[test]
    fn request_id_is_reused_only_when_sane() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("edge-42_a.b"));
        assert_eq!(request_id(&headers), "edge-42_a.b");

        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("bad id;drop"));
        let generated = request_id(&headers);
        assert!(Uuid::parse_str(&generated).is_ok());

        let long = "a".repeat(MAX_REQUEST_ID_LEN + 1);
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_str(&long).unwrap());
        assert_ne!(request_id(&headers), long);
    }
}
