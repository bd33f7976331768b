//! Create lots and lot_rates tables

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Lots::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Lots::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Lots::Name).string().not_null())
                    .col(ColumnDef::new(Lots::TotalSlots).integer().not_null())
                    .col(
                        ColumnDef::new(Lots::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(LotRates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LotRates::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LotRates::LotId).integer().not_null())
                    .col(ColumnDef::new(LotRates::RatePerMinute).string().not_null())
                    .col(
                        ColumnDef::new(LotRates::EffectiveFrom)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_lot_rates_lot")
                            .from(LotRates::Table, LotRates::LotId)
                            .to(Lots::Table, Lots::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_lot_rates_lot_effective")
                    .table(LotRates::Table)
                    .col(LotRates::LotId)
                    .col(LotRates::EffectiveFrom)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LotRates::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Lots::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Lots {
    Table,
    Id,
    Name,
    TotalSlots,
    CreatedAt,
}

#[derive(Iden)]
pub enum LotRates {
    Table,
    Id,
    LotId,
    RatePerMinute,
    EffectiveFrom,
}
