//! Create slots table

use sea_orm_migration::prelude::*;

use super::m20240601_000001_create_lots::Lots;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Slots::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Slots::LotId).integer().not_null())
                    .col(ColumnDef::new(Slots::SlotNumber).integer().not_null())
                    .col(
                        ColumnDef::new(Slots::Status)
                            .string()
                            .not_null()
                            .default("Available"),
                    )
                    .col(ColumnDef::new(Slots::Plate).string())
                    .col(ColumnDef::new(Slots::Category).string())
                    .col(ColumnDef::new(Slots::OccupiedSince).timestamp_with_time_zone())
                    .primary_key(
                        Index::create()
                            .name("pk_slots")
                            .col(Slots::LotId)
                            .col(Slots::SlotNumber),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_slots_lot")
                            .from(Slots::Table, Slots::LotId)
                            .to(Lots::Table, Lots::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_slots_lot_status")
                    .table(Slots::Table)
                    .col(Slots::LotId)
                    .col(Slots::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Slots::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Slots {
    Table,
    LotId,
    SlotNumber,
    Status,
    Plate,
    Category,
    OccupiedSince,
}
