use sea_orm::entity::prelude::*;

use super::sea_orm_active_enums::{OrderStatus, PayStatus};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub order_id: String,
    pub business_id: String,
    pub pay_address: String,
    pub algorithm_id: i64,
    /// Smallest-unit integer, base-10 text.
    pub amount: String,
    pub pay_token_id: i64,
    pub pay_status: PayStatus,
    pub order_status: OrderStatus,
    pub created_at_ms: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
