use axum::{
    Json,
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tower_sessions::Session;

use super::observability::AuthenticatedUser;
use super::{ApiError, ApiResponse, AppState, MessageResponse};
use crate::constants::session::{EMAIL_KEY, USER_KEY};
use crate::domain::UserId;

// ============================================================================
// Types
// ============================================================================

/// The caller of an authenticated route, inserted by [`auth_middleware`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: Option<String>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication required")]
    MissingCredentials,

    #[error("Invalid or expired access token")]
    InvalidToken,

    #[error("Auth provider unavailable: {0}")]
    Provider(String),

    #[error("Session error: {0}")]
    Session(String),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials | AuthError::InvalidToken => {
                ApiError::Unauthorized(err.to_string())
            }
            AuthError::Provider(message) => ApiError::ExternalApiError {
                service: "Auth".to_string(),
                message,
            },
            AuthError::Session(msg) => ApiError::internal(msg),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| AuthError::MissingCredentials.into())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    #[serde(default)]
    pub access_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user_id: UserId,
    pub email: Option<String>,
}

// ============================================================================
// Middleware
// ============================================================================

/// Resolves the caller from, in order:
/// 1. Session cookie (from `POST /auth/session`)
/// 2. `Authorization: Bearer <access token>` verified with the auth provider
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = match session_user(&session).await? {
        Some(user) => user,
        None => {
            let token = bearer_token(&headers).ok_or(AuthError::MissingCredentials)?;
            verify(&state, &token).await?
        }
    };

    let id = user.id.clone();
    request.extensions_mut().insert(user);
    let mut response = next.run(request).await;
    response.extensions_mut().insert(AuthenticatedUser(id));
    Ok(response)
}

async fn session_user(session: &Session) -> Result<Option<CurrentUser>, AuthError> {
    let id = session
        .get::<String>(USER_KEY)
        .await
        .map_err(|e| AuthError::Session(e.to_string()))?;

    let Some(id) = id else {
        return Ok(None);
    };

    let email = session
        .get::<String>(EMAIL_KEY)
        .await
        .map_err(|e| AuthError::Session(e.to_string()))?;

    Ok(Some(CurrentUser {
        id: UserId::new(id),
        email,
    }))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get("Authorization")?.to_str().ok()?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty()).then(|| token.to_string())
}

async fn verify(state: &AppState, token: &str) -> Result<CurrentUser, AuthError> {
    match state.shared.auth.verify_token(token).await {
        Ok(Some(user)) => Ok(CurrentUser {
            id: user.id,
            email: user.email,
        }),
        Ok(None) => Err(AuthError::InvalidToken),
        Err(e) => Err(AuthError::Provider(format!("{e:#}"))),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/session
/// Exchange an access token (header or body) for a session cookie
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    session: Session,
    body: Option<Json<SessionRequest>>,
) -> Result<Json<ApiResponse<SessionResponse>>, ApiError> {
    let token = bearer_token(&headers)
        .or_else(|| body.and_then(|Json(b)| b.access_token))
        .filter(|t| !t.trim().is_empty())
        .ok_or(AuthError::MissingCredentials)?;

    let user = verify(&state, token.trim()).await?;

    session
        .cycle_id()
        .await
        .map_err(|e| AuthError::Session(e.to_string()))?;
    session
        .insert(USER_KEY, user.id.as_str())
        .await
        .map_err(|e| AuthError::Session(e.to_string()))?;
    if let Some(email) = &user.email {
        session
            .insert(EMAIL_KEY, email)
            .await
            .map_err(|e| AuthError::Session(e.to_string()))?;
    }

    tracing::info!(user_id = %user.id, "Session created");

    Ok(Json(ApiResponse::success(SessionResponse {
        user_id: user.id,
        email: user.email,
    })))
}

/// POST /auth/logout
/// Invalidate the current session
pub async fn logout(session: Session) -> impl IntoResponse {
    let _ = session.flush().await;
    Json(ApiResponse::success(MessageResponse::new("Logged out")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_is_trimmed() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", "Bearer  abc.def ".parse().unwrap());
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc.def"));
    }

    #[test]
    fn non_bearer_schemes_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", "Basic dXNlcjpwYXNz".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        headers.insert("Authorization", "Bearer    ".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }
}
