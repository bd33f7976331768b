//! Payment attempt entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_attempts")]
pub struct Model {
    /// Gateway transaction reference
    #[sea_orm(primary_key, auto_increment = false)]
    pub reference: String,

    pub session_id: i32,
    pub attempt_no: i32,

    #[sea_orm(unique)]
    pub idempotency_key: String,

    /// Decimal amount, canonical text
    pub amount: String,
    pub phone: String,

    /// Attempt status: Pending, Successful, Failed
    pub status: String,

    #[sea_orm(nullable)]
    pub gateway_status: Option<String>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::parking_session::Entity",
        from = "Column::SessionId",
        to = "super::parking_session::Column::Id"
    )]
    ParkingSession,
}

impl Related<super::parking_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ParkingSession.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
