//! Daily paid income per lot

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "lot_income")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub lot_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub day: Date,

    /// Decimal total, canonical text
    pub total: String,
    pub payments: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
