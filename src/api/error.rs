use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::fmt;

use super::ApiResponse;
use crate::services::{
    AccountError, ContentError, GenerationError, LedgerError, SubscriptionError,
};

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),

    DatabaseError(String),

    ExternalApiError { service: String, message: String },

    ValidationError(String),

    Conflict(String),

    InternalError(String),

    Unauthorized(String),

    Forbidden(String),

    InsufficientTokens {
        required: i32,
        available: i32,
        shortfall: i32,
    },

    ServiceUnavailable(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            ApiError::ExternalApiError { service, message } => {
                write!(f, "{} error: {}", service, message)
            }
            ApiError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::InsufficientTokens {
                required,
                available,
                ..
            } => write!(
                f,
                "Insufficient tokens: {} required, {} available",
                required, available
            ),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

/// Body of a 402: the usual envelope plus the numbers a client needs to
/// render an upgrade prompt.
#[derive(Serialize)]
struct InsufficientTokensBody {
    success: bool,
    error: String,
    required: i32,
    available: i32,
    shortfall: i32,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Database error: {msg}"),
                )
            }
            ApiError::ExternalApiError { service, message } => {
                tracing::warn!("{} API error: {}", service, message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("{} request failed: {}", service, message),
                )
            }
            ApiError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            ApiError::InsufficientTokens {
                required,
                available,
                shortfall,
            } => {
                let body = InsufficientTokensBody {
                    success: false,
                    error: format!(
                        "Insufficient tokens. This action costs {required} tokens and you have {available}."
                    ),
                    required: *required,
                    available: *available,
                    shortfall: *shortfall,
                };
                return (StatusCode::PAYMENT_REQUIRED, Json(body)).into_response();
            }
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
        };

        let body = ApiResponse::<()>::error(error_message);
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientBalance {
                required,
                available,
                shortfall,
            } => ApiError::InsufficientTokens {
                required,
                available,
                shortfall,
            },
            LedgerError::InvalidAmount(_) => ApiError::validation(err.to_string()),
            LedgerError::Database(msg) => ApiError::DatabaseError(msg),
        }
    }
}

impl From<SubscriptionError> for ApiError {
    fn from(err: SubscriptionError) -> Self {
        match err {
            SubscriptionError::NoActiveSubscription | SubscriptionError::CustomerNotFound => {
                ApiError::NotFound(err.to_string())
            }
            SubscriptionError::NotConfigured | SubscriptionError::PriceNotConfigured(_) => {
                ApiError::ServiceUnavailable(err.to_string())
            }
            SubscriptionError::InvalidTier(_)
            | SubscriptionError::InvalidSignature(_)
            | SubscriptionError::InvalidPayload(_) => ApiError::validation(err.to_string()),
            SubscriptionError::AlreadySubscribed(_) => ApiError::Conflict(err.to_string()),
            SubscriptionError::Billing(message) => ApiError::stripe_error(message),
            SubscriptionError::Ledger(e) => e.into(),
            SubscriptionError::Database(msg) => ApiError::DatabaseError(msg),
        }
    }
}

impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Validation(msg) => ApiError::ValidationError(msg),
            GenerationError::PlanRequired(_) => ApiError::Forbidden(err.to_string()),
            GenerationError::Ledger(e) => e.into(),
            GenerationError::NotFound(msg) => ApiError::NotFound(msg),
            GenerationError::Upstream(message) => ApiError::ExternalApiError {
                service: "Generation".to_string(),
                message,
            },
            GenerationError::Database(msg) => ApiError::DatabaseError(msg),
        }
    }
}

impl From<ContentError> for ApiError {
    fn from(err: ContentError) -> Self {
        match err {
            ContentError::NotFound(id) => ApiError::not_found("Content", id),
            ContentError::Validation(msg) => ApiError::ValidationError(msg),
            ContentError::Database(msg) => ApiError::DatabaseError(msg),
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Ledger(e) => e.into(),
            AccountError::Subscription(e) => e.into(),
            AccountError::Database(msg) => ApiError::DatabaseError(msg),
        }
    }
}

impl ApiError {
    pub fn not_found(resource: &str, id: impl fmt::Display) -> Self {
        ApiError::NotFound(format!("{} {} not found", resource, id))
    }

    pub fn stripe_error(msg: impl Into<String>) -> Self {
        ApiError::ExternalApiError {
            service: "Stripe".to_string(),
            message: msg.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::ValidationError(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ApiError::Forbidden(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ApiError::InternalError(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SubscriptionTier;

    #[test]
    fn ledger_shortfall_maps_to_payment_required() {
        let err: ApiError = LedgerError::insufficient(10, 3).into();
        assert!(matches!(
            err,
            ApiError::InsufficientTokens {
                required: 10,
                available: 3,
                shortfall: 7
            }
        ));
        assert_eq!(err.into_response().status(), StatusCode::PAYMENT_REQUIRED);
    }

    #[test]
    fn plan_gate_maps_to_forbidden() {
        let err: ApiError = GenerationError::PlanRequired(SubscriptionTier::Free).into();
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn nested_ledger_error_keeps_status() {
        let err: ApiError =
            SubscriptionError::Ledger(LedgerError::Database("locked".into())).into();
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn missing_subscription_is_not_found() {
        let err: ApiError = SubscriptionError::NoActiveSubscription.into();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn database_failure_carries_the_message() {
        let err: ApiError = ContentError::Database("disk I/O error".into()).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Database error: disk I/O error");
    }

    #[test]
    fn upstream_failure_is_internal_error_with_message() {
        let err: ApiError = GenerationError::Upstream("rate limited".into()).into();
        assert_eq!(err.to_string(), "Generation error: rate limited");
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
