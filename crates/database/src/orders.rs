use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ActiveValue::NotSet, ActiveValue::Set, ColumnTrait,
    EntityTrait, QueryFilter, QueryOrder,
};
use tracing::{error, info};

use crate::{
    client::DbClient,
    entities::{
        orders,
        sea_orm_active_enums::{OrderStatus, PayStatus},
    },
};

/// Order as submitted by the order-creation API; `order_id` is derived.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub business_id: String,
    pub pay_address: String,
    pub algorithm_id: i64,
    pub amount: u128,
    pub pay_token_id: i64,
    pub created_at_ms: i64,
}

/// Content hash identifying an order. Callers never pick their own id.
pub fn compute_order_id(
    business_id: &str,
    pay_address: &str,
    pay_token_id: i64,
    amount: u128,
    created_at_ms: i64,
) -> String {
    let preimage = format!(
        "{}|{}|{}|{}|{}",
        business_id, pay_address, pay_token_id, amount, created_at_ms
    );
    blake3::hash(preimage.as_bytes()).to_hex().to_string()
}

pub fn parse_amount(raw: &str) -> eyre::Result<u128> {
    raw.trim()
        .parse::<u128>()
        .map_err(|e| eyre::eyre!("invalid stored amount {:?}: {}", raw, e))
}

impl DbClient {
    pub async fn create_order(&self, order: NewOrder) -> eyre::Result<orders::Model> {
        let order_id = compute_order_id(
            &order.business_id,
            &order.pay_address,
            order.pay_token_id,
            order.amount,
            order.created_at_ms,
        );

        let model = orders::ActiveModel {
            id: NotSet,
            order_id: Set(order_id.clone()),
            business_id: Set(order.business_id),
            pay_address: Set(order.pay_address),
            algorithm_id: Set(order.algorithm_id),
            amount: Set(order.amount.to_string()),
            pay_token_id: Set(order.pay_token_id),
            pay_status: Set(PayStatus::Unpaid),
            order_status: Set(OrderStatus::Normal),
            created_at_ms: Set(order.created_at_ms),
        }
        .insert(&self.primary)
        .await
        .map_err(|e| {
            error!("Failed to insert order {}: {:?}", order_id, e);
            eyre::eyre!("Failed to insert order {}: {:?}", order_id, e)
        })?;

        info!("Created order {}", model.order_id);
        Ok(model)
    }

    pub async fn get_order_by_id(&self, order_id: &str) -> eyre::Result<Option<orders::Model>> {
        let order = orders::Entity::find()
            .filter(orders::Column::OrderId.eq(order_id))
            .one(&self.primary)
            .await?;
        Ok(order)
    }

    /// Most recently created order for an exact address/token/amount triple
    /// that is still live and waiting for payment.
    pub async fn get_order_by_address_token_amount(
        &self,
        pay_address: &str,
        pay_token_id: i64,
        amount: u128,
    ) -> eyre::Result<Option<orders::Model>> {
        let order = orders::Entity::find()
            .filter(orders::Column::PayAddress.eq(pay_address))
            .filter(orders::Column::PayTokenId.eq(pay_token_id))
            .filter(orders::Column::Amount.eq(amount.to_string()))
            .filter(orders::Column::OrderStatus.eq(OrderStatus::Normal))
            .filter(orders::Column::PayStatus.eq(PayStatus::Unpaid))
            .order_by_desc(orders::Column::Id)
            .one(&self.primary)
            .await?;
        Ok(order)
    }

    /// Used by the refund path when an order is voided.
    pub async fn set_order_status(&self, order_id: &str, status: OrderStatus) -> eyre::Result<u64> {
        let res = orders::Entity::update_many()
            .col_expr(orders::Column::OrderStatus, Expr::value(status))
            .filter(orders::Column::OrderId.eq(order_id))
            .exec(&self.primary)
            .await?;
        Ok(res.rows_affected)
    }
}
