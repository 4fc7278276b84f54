use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Profile {
    Table,
    Id,
    UserId,
    Email,
    DisplayName,
    Role,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum UserSecret {
    Table,
    UserId,
    PasswordHash,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum AdminSettings {
    Table,
    Id,
    UserId,
    MsGraphEnabled,
    MsGraphTenantId,
    MsGraphClientId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Profile::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Profile::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Profile::UserId).uuid().not_null().unique_key())
                    .col(
                        ColumnDef::new(Profile::Email)
                            .string_len(320)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Profile::DisplayName).string_len(100))
                    .col(
                        ColumnDef::new(Profile::Role)
                            .string_len(16)
                            .not_null()
                            .default("user"),
                    )
                    .col(
                        ColumnDef::new(Profile::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Profile::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserSecret::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(UserSecret::UserId).uuid().not_null().primary_key())
                    .col(ColumnDef::new(UserSecret::PasswordHash).text().not_null())
                    .col(
                        ColumnDef::new(UserSecret::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_secret_profile")
                            .from(UserSecret::Table, UserSecret::UserId)
                            .to(Profile::Table, Profile::UserId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AdminSettings::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(AdminSettings::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(AdminSettings::UserId)
                            .uuid()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(AdminSettings::MsGraphEnabled)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(AdminSettings::MsGraphTenantId).string_len(100))
                    .col(ColumnDef::new(AdminSettings::MsGraphClientId).string_len(100))
                    .col(
                        ColumnDef::new(AdminSettings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(AdminSettings::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_admin_settings_profile")
                            .from(AdminSettings::Table, AdminSettings::UserId)
                            .to(Profile::Table, Profile::UserId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AdminSettings::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserSecret::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Profile::Table).if_exists().to_owned())
            .await?;
        Ok(())
    }
}
