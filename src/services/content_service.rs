use crate::db::{ContentItem, ContentPatch, ContentQuery};
use crate::domain::{ContentStatus, UserId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContentError {
    /// Missing, or owned by another user. The two are not distinguished.
    #[error("Content not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for ContentError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(format!("{err:#}"))
    }
}

/// History of generated content, always scoped to the calling user.
#[async_trait::async_trait]
pub trait ContentService: Send + Sync {
    async fn list(&self, user: &UserId, query: ContentQuery)
    -> Result<Vec<ContentItem>, ContentError>;

    async fn get(&self, user: &UserId, id: &str) -> Result<ContentItem, ContentError>;

    /// # Errors
    ///
    /// - [`ContentError::Validation`] when the patch changes nothing
    /// - [`ContentError::NotFound`] when no row matches `(id, user)`
    async fn update(
        &self,
        user: &UserId,
        id: &str,
        patch: ContentPatch,
    ) -> Result<ContentItem, ContentError>;

    async fn update_status(
        &self,
        user: &UserId,
        id: &str,
        status: ContentStatus,
    ) -> Result<ContentItem, ContentError>;

    async fn delete(&self, user: &UserId, id: &str) -> Result<(), ContentError>;
}
