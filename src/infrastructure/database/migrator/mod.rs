//! Database migrations module

pub use sea_orm_migration::prelude::*;

mod m20240601_000001_create_lots;
mod m20240601_000002_create_slots;
mod m20240601_000003_create_parking_sessions;
mod m20240601_000004_create_payment_attempts;
mod m20240601_000005_create_lot_income;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_create_lots::Migration),
            Box::new(m20240601_000002_create_slots::Migration),
            Box::new(m20240601_000003_create_parking_sessions::Migration),
            Box::new(m20240601_000004_create_payment_attempts::Migration),
            Box::new(m20240601_000005_create_lot_income::Migration),
        ]
    }
}
