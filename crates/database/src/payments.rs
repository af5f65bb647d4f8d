use sea_orm::{
    sea_query::{Expr, OnConflict},
    ActiveValue::NotSet,
    ActiveValue::Set,
    ColumnTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use tracing::{debug, error, info, warn};

use crate::{
    client::DbClient,
    entities::{
        notices, orders, payments,
        sea_orm_active_enums::{
            EventType, NoticeStatus, PayHashStatus, PayStatus, RefundStatus,
        },
    },
};

/// A confirmed on-chain transfer credited against an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRecord {
    pub pay_hash: String,
    pub order_id: String,
    /// Payer address. Empty when the chain does not expose one cheaply.
    pub pay_address: String,
    pub algorithm_id: i64,
    pub timestamp: i64,
    pub amount: u128,
    pub pay_token_id: i64,
}

impl PaymentRecord {
    fn active_model(&self, refund_status: RefundStatus) -> payments::ActiveModel {
        payments::ActiveModel {
            id: NotSet,
            pay_hash: Set(self.pay_hash.clone()),
            order_id: Set(self.order_id.clone()),
            pay_address: Set(self.pay_address.clone()),
            algorithm_id: Set(self.algorithm_id),
            timestamp: Set(self.timestamp),
            amount: Set(self.amount.to_string()),
            pay_token_id: Set(self.pay_token_id),
            pay_hash_status: Set(PayHashStatus::Confirmed),
            refund_status: Set(refund_status),
            refund_hash: Set(String::new()),
            refund_nonce: Set(0),
        }
    }
}

fn db_error(context: &str, e: DbErr) -> eyre::Report {
    error!("{}: {:?}", context, e);
    eyre::eyre!("{}: {:?}", context, e)
}

impl DbClient {
    /// Marks the order paid and records the payment and its callback notice in
    /// one transaction. Returns `false` without touching the store when
    /// `pay_hash` is already recorded, so replays are no-ops.
    ///
    /// When the order already carries a different confirmed payment, that
    /// payment is handed to the refund path and the new one takes its place.
    pub async fn settle_order_payment(
        &self,
        order: &orders::Model,
        payment: &PaymentRecord,
    ) -> eyre::Result<bool> {
        let txn = self
            .primary
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin settlement transaction", e))?;

        let existing = payments::Entity::find()
            .filter(payments::Column::PayHash.eq(payment.pay_hash.as_str()))
            .one(&txn)
            .await
            .map_err(|e| db_error("Failed to look up payment", e))?;
        if let Some(existing) = existing {
            if existing.order_id != order.order_id {
                warn!(
                    "Payment {} already credited to order {}, not settling order {}",
                    payment.pay_hash, existing.order_id, order.order_id
                );
            } else {
                debug!("Payment {} already recorded", payment.pay_hash);
            }
            txn.rollback()
                .await
                .map_err(|e| db_error("Failed to end settlement transaction", e))?;
            return Ok(false);
        }

        orders::Entity::update_many()
            .col_expr(orders::Column::PayStatus, Expr::value(PayStatus::Paid))
            .filter(orders::Column::OrderId.eq(order.order_id.as_str()))
            .filter(orders::Column::PayStatus.eq(PayStatus::Unpaid))
            .exec(&txn)
            .await
            .map_err(|e| db_error("Failed to mark order paid", e))?;

        let demoted = payments::Entity::update_many()
            .col_expr(
                payments::Column::RefundStatus,
                Expr::value(RefundStatus::UnRefunded),
            )
            .filter(payments::Column::OrderId.eq(order.order_id.as_str()))
            .filter(payments::Column::PayHashStatus.eq(PayHashStatus::Confirmed))
            .filter(payments::Column::RefundStatus.eq(RefundStatus::Default))
            .filter(payments::Column::PayHash.ne(payment.pay_hash.as_str()))
            .exec(&txn)
            .await
            .map_err(|e| db_error("Failed to demote superseded payments", e))?;
        if demoted.rows_affected > 0 {
            info!(
                "Order {} re-paid by {}, {} earlier payment(s) queued for refund",
                order.order_id, payment.pay_hash, demoted.rows_affected
            );
        }

        payments::Entity::insert(payment.active_model(RefundStatus::Default))
            .on_conflict(
                OnConflict::column(payments::Column::PayHash)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&txn)
            .await
            .map_err(|e| db_error("Failed to insert payment", e))?;

        let notice = notices::ActiveModel {
            id: NotSet,
            order_id: Set(order.order_id.clone()),
            event_type: Set(EventType::OrderPay),
            notice_count: Set(0),
            notice_status: Set(NoticeStatus::Default),
            timestamp: Set(chrono::Utc::now().timestamp_millis()),
        };
        notices::Entity::insert(notice)
            .on_conflict(
                OnConflict::column(notices::Column::OrderId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&txn)
            .await
            .map_err(|e| db_error("Failed to insert notice", e))?;

        payments::Entity::update_many()
            .col_expr(
                payments::Column::PayAddress,
                Expr::value(payment.pay_address.clone()),
            )
            .col_expr(
                payments::Column::AlgorithmId,
                Expr::value(payment.algorithm_id),
            )
            .col_expr(payments::Column::Timestamp, Expr::value(payment.timestamp))
            .col_expr(
                payments::Column::Amount,
                Expr::value(payment.amount.to_string()),
            )
            .col_expr(
                payments::Column::PayHashStatus,
                Expr::value(PayHashStatus::Confirmed),
            )
            .filter(payments::Column::PayHash.eq(payment.pay_hash.as_str()))
            .exec(&txn)
            .await
            .map_err(|e| db_error("Failed to finalize payment", e))?;

        txn.commit()
            .await
            .map_err(|e| db_error("Failed to commit settlement", e))?;

        debug!("Settled order {} with {}", order.order_id, payment.pay_hash);
        Ok(true)
    }

    /// Records a transfer that reached an order but cannot settle it, so the
    /// refund path returns the funds. Idempotent on `pay_hash`.
    pub async fn create_mismatch_payment(&self, payment: &PaymentRecord) -> eyre::Result<()> {
        let inserted = payments::Entity::insert(payment.active_model(RefundStatus::UnRefunded))
            .on_conflict(
                OnConflict::column(payments::Column::PayHash)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.primary)
            .await
            .map_err(|e| db_error("Failed to insert mismatch payment", e))?;

        if inserted > 0 {
            info!(
                "Recorded mismatch payment {} for order {}",
                payment.pay_hash, payment.order_id
            );
        }
        Ok(())
    }

    pub async fn get_payment(&self, pay_hash: &str) -> eyre::Result<Option<payments::Model>> {
        let payment = payments::Entity::find()
            .filter(payments::Column::PayHash.eq(pay_hash))
            .one(&self.primary)
            .await?;
        Ok(payment)
    }

    pub async fn payments_for_order(&self, order_id: &str) -> eyre::Result<Vec<payments::Model>> {
        let rows = payments::Entity::find()
            .filter(payments::Column::OrderId.eq(order_id))
            .order_by_asc(payments::Column::Id)
            .all(&self.primary)
            .await?;
        Ok(rows)
    }

    /// Confirmed payments waiting for a refund, oldest first.
    pub async fn list_refundable_payments(
        &self,
        older_than_ms: i64,
        limit: u64,
    ) -> eyre::Result<Vec<payments::Model>> {
        let rows = payments::Entity::find()
            .filter(payments::Column::PayHashStatus.eq(PayHashStatus::Confirmed))
            .filter(payments::Column::RefundStatus.eq(RefundStatus::UnRefunded))
            .filter(payments::Column::Timestamp.lt(older_than_ms))
            .order_by_asc(payments::Column::Id)
            .limit(limit)
            .all(&self.primary)
            .await?;
        Ok(rows)
    }
}
