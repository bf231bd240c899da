use sea_orm_migration::prelude::*;

use super::m20250301_000001_create_users::Users;

#[derive(DeriveIden)]
enum Withdrawals {
    Table,
    Id,
    UserId,
    Amount,
    Address,
    Status,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Withdrawals::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Withdrawals::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Withdrawals::UserId).uuid().not_null())
                    .col(ColumnDef::new(Withdrawals::Amount).double().not_null())
                    .col(ColumnDef::new(Withdrawals::Address).string_len(255).null())
                    .col(
                        ColumnDef::new(Withdrawals::Status)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(Withdrawals::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_withdrawals_user")
                            .from(Withdrawals::Table, Withdrawals::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_withdrawals_user_created")
                    .table(Withdrawals::Table)
                    .col(Withdrawals::UserId)
                    .col(Withdrawals::CreatedAt)
                    .to_owned(),
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Withdrawals::Table).to_owned())
            .await
    }
}
