use sea_orm::entity::prelude::*;

use super::sea_orm_active_enums::{PayHashStatus, RefundStatus};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub pay_hash: String,
    pub order_id: String,
    /// Payer address, used by the refund path.
    pub pay_address: String,
    pub algorithm_id: i64,
    pub timestamp: i64,
    pub amount: String,
    pub pay_token_id: i64,
    pub pay_hash_status: PayHashStatus,
    pub refund_status: RefundStatus,
    pub refund_hash: String,
    pub refund_nonce: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
