use crate::constants::limits::MAX_HISTORY_LIMIT;
use crate::db::{ContentItem, ContentPatch, ContentQuery, Store};
use crate::domain::{ContentStatus, UserId};
use crate::services::content_service::{ContentError, ContentService};
use std::sync::Arc;
use tracing::info;

pub struct SeaOrmContentService {
    store: Arc<Store>,
}

impl SeaOrmContentService {
    #[must_use]
    pub const fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    async fn reload(&self, user: &UserId, id: &str) -> Result<ContentItem, ContentError> {
        self.store
            .get_content(id, user.as_str())
            .await?
            .ok_or_else(|| ContentError::NotFound(id.to_string()))
    }
}

#[async_trait::async_trait]
impl ContentService for SeaOrmContentService {
    async fn list(
        &self,
        user: &UserId,
        query: ContentQuery,
    ) -> Result<Vec<ContentItem>, ContentError> {
        let query = ContentQuery {
            limit: query.limit.clamp(1, MAX_HISTORY_LIMIT),
            ..query
        };
        Ok(self.store.list_content(user.as_str(), query).await?)
    }

    async fn get(&self, user: &UserId, id: &str) -> Result<ContentItem, ContentError> {
        self.reload(user, id).await
    }

    async fn update(
        &self,
        user: &UserId,
        id: &str,
        patch: ContentPatch,
    ) -> Result<ContentItem, ContentError> {
        if patch.is_empty() {
            return Err(ContentError::Validation("Nothing to update".to_string()));
        }
        if patch
            .repurposed_content
            .as_deref()
            .is_some_and(|text| text.trim().is_empty())
        {
            return Err(ContentError::Validation(
                "Repurposed content cannot be empty".to_string(),
            ));
        }

        if !self.store.update_content(id, user.as_str(), patch).await? {
            return Err(ContentError::NotFound(id.to_string()));
        }

        info!(user_id = %user, content_id = id, "Content updated");
        self.reload(user, id).await
    }

    async fn update_status(
        &self,
        user: &UserId,
        id: &str,
        status: ContentStatus,
    ) -> Result<ContentItem, ContentError> {
        if !self
            .store
            .update_content_status(id, user.as_str(), status)
            .await?
        {
            return Err(ContentError::NotFound(id.to_string()));
        }

        info!(user_id = %user, content_id = id, %status, "Content status changed");
        self.reload(user, id).await
    }

    async fn delete(&self, user: &UserId, id: &str) -> Result<(), ContentError> {
        if self.store.delete_content(id, user.as_str()).await? {
            Ok(())
        } else {
            Err(ContentError::NotFound(id.to_string()))
        }
    }
}
