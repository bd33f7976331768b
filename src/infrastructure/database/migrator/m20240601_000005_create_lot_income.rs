//! Create lot_income table

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
                    .table(LotIncome::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(LotIncome::LotId).integer().not_null())
                    .col(ColumnDef::new(LotIncome::Day).date().not_null())
                    .col(
                        ColumnDef::new(LotIncome::Total)
                            .string()
                            .not_null()
                            .default("0"),
                    )
                    .col(
                        ColumnDef::new(LotIncome::Payments)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .primary_key(
                        Index::create()
                            .name("pk_lot_income")
                            .col(LotIncome::LotId)
                            .col(LotIncome::Day),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_lot_income_lot")
                            .from(LotIncome::Table, LotIncome::LotId)
                            .to(Lots::Table, Lots::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LotIncome::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum LotIncome {
    Table,
    LotId,
    Day,
    Total,
    Payments,
}
