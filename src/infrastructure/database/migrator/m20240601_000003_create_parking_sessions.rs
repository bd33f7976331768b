//! Create parking_sessions table
//!
//! At most one Active session per plate and per slot within a lot. SQLite
//! expresses this with partial unique indexes, which sea-query cannot build,
//! so they are issued as raw statements.

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
                    .table(ParkingSessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ParkingSessions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ParkingSessions::LotId).integer().not_null())
                    .col(ColumnDef::new(ParkingSessions::SlotId).integer().not_null())
                    .col(ColumnDef::new(ParkingSessions::Plate).string().not_null())
                    .col(ColumnDef::new(ParkingSessions::Category).string().not_null())
                    .col(
                        ColumnDef::new(ParkingSessions::EntryTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ParkingSessions::ExitTime).timestamp_with_time_zone())
                    .col(ColumnDef::new(ParkingSessions::Fee).string())
                    .col(ColumnDef::new(ParkingSessions::RatePerMinute).string())
                    .col(ColumnDef::new(ParkingSessions::PaymentRef).string())
                    .col(
                        ColumnDef::new(ParkingSessions::PaymentAttempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ParkingSessions::Status)
                            .string()
                            .not_null()
                            .default("Active"),
                    )
                    .col(ColumnDef::new(ParkingSessions::RecordedBy).string().not_null())
                    .col(
                        ColumnDef::new(ParkingSessions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_parking_sessions_lot")
                            .from(ParkingSessions::Table, ParkingSessions::LotId)
                            .to(Lots::Table, Lots::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_parking_sessions_status")
                    .table(ParkingSessions::Table)
                    .col(ParkingSessions::Status)
                    .to_owned(),
            )
            .await?;

        let db = manager.get_connection();
        db.execute_unprepared(
            "CREATE UNIQUE INDEX IF NOT EXISTS ux_parking_sessions_active_plate \
             ON parking_sessions (lot_id, plate) WHERE status = 'Active'",
        )
        .await?;
        db.execute_unprepared(
            "CREATE UNIQUE INDEX IF NOT EXISTS ux_parking_sessions_active_slot \
             ON parking_sessions (lot_id, slot_id) WHERE status = 'Active'",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ParkingSessions::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum ParkingSessions {
    Table,
    Id,
    LotId,
    SlotId,
    Plate,
    Category,
    EntryTime,
    ExitTime,
    Fee,
    RatePerMinute,
    PaymentRef,
    PaymentAttempts,
    Status,
    RecordedBy,
    UpdatedAt,
}
