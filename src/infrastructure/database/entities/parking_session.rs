//! Parking session entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "parking_sessions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub lot_id: i32,
    pub slot_id: i32,
    pub plate: String,
    pub category: String,
    pub entry_time: DateTimeUtc,

    #[sea_orm(nullable)]
    pub exit_time: Option<DateTimeUtc>,

    /// Decimal fee, canonical text. Written once at exit.
    #[sea_orm(nullable)]
    pub fee: Option<String>,

    #[sea_orm(nullable)]
    pub rate_per_minute: Option<String>,

    #[sea_orm(nullable)]
    pub payment_ref: Option<String>,

    pub payment_attempts: i32,

    /// Session status: Active, AwaitingPayment, PaymentPending, Paid, PaymentFailed
    pub status: String,

    pub recorded_by: String,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::lot::Entity",
        from = "Column::LotId",
        to = "super::lot::Column::Id"
    )]
    Lot,
    #[sea_orm(has_many = "super::payment_attempt::Entity")]
    PaymentAttempt,
}

impl Related<super::lot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lot.def()
    }
}

impl Related<super::payment_attempt::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PaymentAttempt.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
