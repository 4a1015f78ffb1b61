use crate::entities::prelude::*;
use crate::entities::{content_history, token_transactions};
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .name("idx_token_transactions_user_id")
                    .table(TokenTransactions)
                    .col(token_transactions::Column::UserId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_content_history_user_created")
                    .table(ContentHistory)
                    .col(content_history::Column::UserId)
                    .col(content_history::Column::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_content_history_user_created")
                    .table(ContentHistory)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_token_transactions_user_id")
                    .table(TokenTransactions)
                    .to_owned(),
            )
            .await
    }
}
