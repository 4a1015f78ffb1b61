use crate::domain::{ContentStatus, OutputFormat, Tone};
use crate::entities::{content_history, prelude::*};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentItem {
    pub id: String,
    pub user_id: String,
    pub original_content: String,
    pub repurposed_content: String,
    pub output_format: String,
    pub tone: String,
    pub status: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewContent<'a> {
    /// Pre-allocated id, so ledger rows can reference the item before it
    /// exists. `None` generates one.
    pub id: Option<&'a str>,
    pub user_id: &'a str,
    pub original_content: &'a str,
    pub repurposed_content: &'a str,
    pub output_format: OutputFormat,
    pub tone: Tone,
    pub status: ContentStatus,
}

/// Editable fields of a history item. `None` leaves the column as is.
#[derive(Debug, Clone, Default)]
pub struct ContentPatch {
    pub repurposed_content: Option<String>,
    pub tone: Option<Tone>,
    pub output_format: Option<OutputFormat>,
    pub status: Option<ContentStatus>,
}

impl ContentPatch {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.repurposed_content.is_none()
            && self.tone.is_none()
            && self.output_format.is_none()
            && self.status.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ContentQuery {
    pub status: Option<ContentStatus>,
    pub limit: u64,
    pub offset: u64,
}

/// Every read and write is scoped to `(id, user_id)`.
pub struct ContentRepository {
    conn: DatabaseConnection,
}

impl ContentRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_model(m: content_history::Model) -> ContentItem {
        ContentItem {
            id: m.id,
            user_id: m.user_id,
            original_content: m.original_content,
            repurposed_content: m.repurposed_content,
            output_format: m.output_format,
            tone: m.tone,
            status: m.status,
            image_url: m.image_url,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }

    pub async fn insert(&self, new: NewContent<'_>) -> Result<ContentItem> {
        let now = Utc::now();
        let id = new
            .id
            .map_or_else(|| uuid::Uuid::new_v4().to_string(), ToString::to_string);

        let model = content_history::ActiveModel {
            id: Set(id.clone()),
            user_id: Set(new.user_id.to_string()),
            original_content: Set(new.original_content.to_string()),
            repurposed_content: Set(new.repurposed_content.to_string()),
            output_format: Set(new.output_format.as_str().to_string()),
            tone: Set(new.tone.as_str().to_string()),
            status: Set(new.status.as_str().to_string()),
            image_url: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        ContentHistory::insert(model)
            .exec_without_returning(&self.conn)
            .await
            .context("Failed to insert content history")?;

        self.get(&id, new.user_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Inserted content {id} could not be read back"))
    }

    pub async fn get(&self, id: &str, user_id: &str) -> Result<Option<ContentItem>> {
        let row = ContentHistory::find()
            .filter(content_history::Column::Id.eq(id))
            .filter(content_history::Column::UserId.eq(user_id))
            .one(&self.conn)
            .await
            .context("Failed to query content item")?;

        Ok(row.map(Self::map_model))
    }

    pub async fn list(&self, user_id: &str, query: ContentQuery) -> Result<Vec<ContentItem>> {
        let mut select = ContentHistory::find()
            .filter(content_history::Column::UserId.eq(user_id));

        if let Some(status) = query.status {
            select = select.filter(content_history::Column::Status.eq(status.as_str()));
        }

        let rows = select
            .order_by_desc(content_history::Column::CreatedAt)
            .limit(query.limit)
            .offset(query.offset)
            .all(&self.conn)
            .await
            .context("Failed to list content history")?;

        Ok(rows.into_iter().map(Self::map_model).collect())
    }

    /// Returns `false` when no row matched `(id, user_id)`.
    pub async fn update(&self, id: &str, user_id: &str, patch: ContentPatch) -> Result<bool> {
        use content_history::Column;

        let mut update =
            ContentHistory::update_many().col_expr(Column::UpdatedAt, Expr::value(Utc::now()));

        if let Some(text) = patch.repurposed_content {
            update = update.col_expr(Column::RepurposedContent, Expr::value(text));
        }
        if let Some(tone) = patch.tone {
            update = update.col_expr(Column::Tone, Expr::value(tone.as_str()));
        }
        if let Some(format) = patch.output_format {
            update = update.col_expr(Column::OutputFormat, Expr::value(format.as_str()));
        }
        if let Some(status) = patch.status {
            update = update.col_expr(Column::Status, Expr::value(status.as_str()));
        }

        let result = update
            .filter(Column::Id.eq(id))
            .filter(Column::UserId.eq(user_id))
            .exec(&self.conn)
            .await
            .context("Failed to update content item")?;

        Ok(result.rows_affected > 0)
    }

    pub async fn set_image_url(&self, id: &str, user_id: &str, url: &str) -> Result<bool> {
        use content_history::Column;

        let result = ContentHistory::update_many()
            .col_expr(Column::ImageUrl, Expr::value(url))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(Column::Id.eq(id))
            .filter(Column::UserId.eq(user_id))
            .exec(&self.conn)
            .await
            .context("Failed to attach image to content item")?;

        Ok(result.rows_affected > 0)
    }

    pub async fn delete(&self, id: &str, user_id: &str) -> Result<bool> {
        let result = ContentHistory::delete_many()
            .filter(content_history::Column::Id.eq(id))
            .filter(content_history::Column::UserId.eq(user_id))
            .exec(&self.conn)
            .await
            .context("Failed to delete content item")?;

        let removed = result.rows_affected > 0;
        if removed {
            info!(content_id = id, user_id, "Deleted content item");
        }
        Ok(removed)
    }
}
