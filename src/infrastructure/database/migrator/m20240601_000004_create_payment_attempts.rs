//! Create payment_attempts table

use sea_orm_migration::prelude::*;

use super::m20240601_000003_create_parking_sessions::ParkingSessions;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PaymentAttempts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PaymentAttempts::Reference)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PaymentAttempts::SessionId).integer().not_null())
                    .col(ColumnDef::new(PaymentAttempts::AttemptNo).integer().not_null())
                    .col(
                        ColumnDef::new(PaymentAttempts::IdempotencyKey)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(PaymentAttempts::Amount).string().not_null())
                    .col(ColumnDef::new(PaymentAttempts::Phone).string().not_null())
                    .col(
                        ColumnDef::new(PaymentAttempts::Status)
                            .string()
                            .not_null()
                            .default("Pending"),
                    )
                    .col(ColumnDef::new(PaymentAttempts::GatewayStatus).string())
                    .col(
                        ColumnDef::new(PaymentAttempts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PaymentAttempts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payment_attempts_session")
                            .from(PaymentAttempts::Table, PaymentAttempts::SessionId)
                            .to(ParkingSessions::Table, ParkingSessions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ux_payment_attempts_session_attempt")
                    .table(PaymentAttempts::Table)
                    .col(PaymentAttempts::SessionId)
                    .col(PaymentAttempts::AttemptNo)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PaymentAttempts::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum PaymentAttempts {
    Table,
    Reference,
    SessionId,
    AttemptNo,
    IdempotencyKey,
    Amount,
    Phone,
    Status,
    GatewayStatus,
    CreatedAt,
    UpdatedAt,
}
