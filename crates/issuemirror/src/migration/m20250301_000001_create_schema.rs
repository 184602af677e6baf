//! Initial migration to create the issuemirror database schema.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_forum_users(manager).await?;
        self.create_categories(manager).await?;
        self.create_repo_categories(manager).await?;
        self.create_topics(manager).await?;
        self.create_posts(manager).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Posts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Topics::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RepoCategories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Categories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ForumUsers::Table).to_owned())
            .await?;
        Ok(())
    }
}

impl Migration {
    async fn create_forum_users(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ForumUsers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ForumUsers::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ForumUsers::Username).string().not_null())
                    .col(ColumnDef::new(ForumUsers::Name).string().null())
                    .col(
                        ColumnDef::new(ForumUsers::GithubLogin)
                            .string()
                            .null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(ForumUsers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_categories(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Categories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Categories::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Categories::Name)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Categories::Description).text().null())
                    .col(ColumnDef::new(Categories::ParentCategoryId).uuid().null())
                    .col(
                        ColumnDef::new(Categories::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_categories_parent")
                            .from(Categories::Table, Categories::ParentCategoryId)
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_repo_categories(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RepoCategories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RepoCategories::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(RepoCategories::CategoryId)
                            .uuid()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(RepoCategories::RepoId)
                            .string()
                            .null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(RepoCategories::RepoName)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RepoCategories::IsIssues)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(RepoCategories::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(RepoCategories::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_repo_categories_category")
                            .from(RepoCategories::Table, RepoCategories::CategoryId)
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Lookup by name for mappings created before the repo id was known
        manager
            .create_index(
                Index::create()
                    .name("idx_repo_categories_repo_name")
                    .table(RepoCategories::Table)
                    .col(RepoCategories::RepoName)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_topics(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Topics::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Topics::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Topics::CategoryId).uuid().null())
                    .col(ColumnDef::new(Topics::UserId).uuid().not_null())
                    .col(ColumnDef::new(Topics::Title).string().not_null())
                    .col(
                        ColumnDef::new(Topics::Archetype)
                            .string()
                            .not_null()
                            .default("regular"),
                    )
                    .col(
                        ColumnDef::new(Topics::Closed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Topics::Tags)
                            .json()
                            .not_null()
                            .default(Expr::cust("'[]'")),
                    )
                    // Mirroring
                    .col(
                        ColumnDef::new(Topics::RemoteNodeId)
                            .string()
                            .null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Topics::RemoteIssueNumber)
                            .big_integer()
                            .null(),
                    )
                    // Timestamps
                    .col(
                        ColumnDef::new(Topics::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Topics::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_topics_category")
                            .from(Topics::Table, Topics::CategoryId)
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_topics_user")
                            .from(Topics::Table, Topics::UserId)
                            .to(ForumUsers::Table, ForumUsers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_topics_category")
                    .table(Topics::Table)
                    .col(Topics::CategoryId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_posts(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Posts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Posts::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Posts::TopicId).uuid().not_null())
                    .col(ColumnDef::new(Posts::UserId).uuid().not_null())
                    .col(ColumnDef::new(Posts::PostNumber).integer().not_null())
                    .col(
                        ColumnDef::new(Posts::PostType)
                            .string()
                            .not_null()
                            .default("regular"),
                    )
                    .col(ColumnDef::new(Posts::ActionCode).string().null())
                    .col(ColumnDef::new(Posts::Raw).text().not_null())
                    // Mirroring
                    .col(
                        ColumnDef::new(Posts::RemoteNodeId)
                            .string()
                            .null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Posts::RemoteCommentNumber)
                            .big_integer()
                            .null(),
                    )
                    // Timestamps
                    .col(
                        ColumnDef::new(Posts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Posts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_posts_topic")
                            .from(Posts::Table, Posts::TopicId)
                            .to(Topics::Table, Topics::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_posts_user")
                            .from(Posts::Table, Posts::UserId)
                            .to(ForumUsers::Table, ForumUsers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Post numbers are unique within a topic
        manager
            .create_index(
                Index::create()
                    .name("idx_posts_topic_post_number")
                    .table(Posts::Table)
                    .col(Posts::TopicId)
                    .col(Posts::PostNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum ForumUsers {
    Table,
    Id,
    Username,
    Name,
    GithubLogin,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Categories {
    Table,
    Id,
    Name,
    Description,
    ParentCategoryId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum RepoCategories {
    Table,
    Id,
    CategoryId,
    RepoId,
    RepoName,
    IsIssues,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Topics {
    Table,
    Id,
    CategoryId,
    UserId,
    Title,
    Archetype,
    Closed,
    Tags,
    RemoteNodeId,
    RemoteIssueNumber,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Posts {
    Table,
    Id,
    TopicId,
    UserId,
    PostNumber,
    PostType,
    ActionCode,
    Raw,
    RemoteNodeId,
    RemoteCommentNumber,
    CreatedAt,
    UpdatedAt,
}
