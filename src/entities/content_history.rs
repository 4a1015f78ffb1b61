use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "content_history")]
pub struct Model {
    /// UUID v4 string.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub user_id: String,

    #[sea_orm(column_type = "Text")]
    pub original_content: String,

    #[sea_orm(column_type = "Text")]
    pub repurposed_content: String,

    pub output_format: String,

    pub tone: String,

    /// draft | published | completed | archived
    pub status: String,

    pub image_url: Option<String>,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
