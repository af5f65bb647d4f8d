use std::{collections::HashSet, sync::Arc};

use common::alert::{Alert, Alerter};
use database::{
    client::DbClient,
    entities::{
        orders,
        sea_orm_active_enums::{OrderStatus, RefundStatus},
    },
    parse_amount, PaymentRecord,
};
use tracing::{debug, info, warn};

use crate::{
    error::ScanError,
    types::{ChainBlock, Transfer},
};

/// How a single transfer was classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// The order was marked paid, or the transfer already settled it.
    Settled { order_id: String },
    /// Funds reached an order that cannot accept them; queued for refund.
    Mismatch { order_id: String },
    /// Tagged transfer pointing at an unknown order or the wrong token.
    Ignored,
    /// No order could take the transfer; alerted.
    Unmatched,
}

pub struct PaymentMatcher {
    chain: String,
    db: Arc<DbClient>,
    alerter: Arc<dyn Alerter>,
}

impl PaymentMatcher {
    pub fn new(chain: impl Into<String>, db: Arc<DbClient>, alerter: Arc<dyn Alerter>) -> Self {
        Self {
            chain: chain.into(),
            db,
            alerter,
        }
    }

    /// Classifies every transfer of the block in order. Stops at the first
    /// persistence failure; already applied transitions are idempotent.
    ///
    /// Payments are keyed by transaction hash, so only the first transfer of
    /// a transaction is matched. Later ones are alerted as unmatched.
    pub async fn process_block(&self, block: &ChainBlock) -> Result<Vec<MatchOutcome>, ScanError> {
        let mut outcomes = Vec::with_capacity(block.transfers.len());
        let mut seen = HashSet::new();
        for transfer in &block.transfers {
            if !seen.insert(transfer.tx_hash.as_str()) {
                warn!(
                    "[{}] tx {} pays more than one watched output, skipping transfer to {}",
                    self.chain, transfer.tx_hash, transfer.to
                );
                self.alert_unmatched(transfer).await;
                outcomes.push(MatchOutcome::Unmatched);
                continue;
            }
            outcomes.push(self.match_transfer(transfer).await?);
        }
        Ok(outcomes)
    }

    pub async fn match_transfer(&self, transfer: &Transfer) -> Result<MatchOutcome, ScanError> {
        if let Some(recorded) = self.db.get_payment(&transfer.tx_hash).await? {
            debug!(
                "[{}] tx {} already recorded for order {}",
                self.chain, transfer.tx_hash, recorded.order_id
            );
            return Ok(if recorded.refund_status == RefundStatus::Default {
                MatchOutcome::Settled {
                    order_id: recorded.order_id,
                }
            } else {
                MatchOutcome::Mismatch {
                    order_id: recorded.order_id,
                }
            });
        }

        match &transfer.tag {
            Some(order_id) => self.match_tagged(transfer, order_id).await,
            None => self.match_untagged(transfer).await,
        }
    }

    async fn match_tagged(
        &self,
        transfer: &Transfer,
        order_id: &str,
    ) -> Result<MatchOutcome, ScanError> {
        let order = self
            .db
            .get_order_by_id(order_id)
            .await?
            .filter(|order| order.pay_address == transfer.to);

        let Some(order) = order else {
            info!(
                "[{}] tx {} tags unknown order {} for {}",
                self.chain, transfer.tx_hash, order_id, transfer.to
            );
            return Ok(MatchOutcome::Ignored);
        };

        if order.pay_token_id != transfer.token_id {
            warn!(
                "[{}] tx {} pays token {} but order {} expects {}",
                self.chain, transfer.tx_hash, transfer.token_id, order.order_id, order.pay_token_id
            );
            return Ok(MatchOutcome::Ignored);
        }

        let expected = parse_amount(&order.amount)?;

        if order.order_status == OrderStatus::Cancelled || transfer.value < expected {
            warn!(
                "[{}] tx {} cannot settle order {} (paid {}, expected {}, status {:?})",
                self.chain,
                transfer.tx_hash,
                order.order_id,
                transfer.value,
                expected,
                order.order_status
            );
            self.db
                .create_mismatch_payment(&payment_record(&order, transfer, transfer.value))
                .await?;
            return Ok(MatchOutcome::Mismatch {
                order_id: order.order_id,
            });
        }

        self.settle(&order, transfer, expected).await
    }

    async fn match_untagged(&self, transfer: &Transfer) -> Result<MatchOutcome, ScanError> {
        let order = self
            .db
            .get_order_by_address_token_amount(&transfer.to, transfer.token_id, transfer.value)
            .await?;

        match order {
            Some(order) => self.settle(&order, transfer, transfer.value).await,
            None => {
                self.alert_unmatched(transfer).await;
                Ok(MatchOutcome::Unmatched)
            }
        }
    }

    async fn alert_unmatched(&self, transfer: &Transfer) {
        self.alerter
            .send(Alert::UnmatchedTransfer {
                chain: self.chain.clone(),
                tx_hash: transfer.tx_hash.clone(),
                sender: transfer.from.clone(),
                recipient: transfer.to.clone(),
                token_id: transfer.token_id,
                amount: transfer.value.to_string(),
            })
            .await;
    }

    async fn settle(
        &self,
        order: &orders::Model,
        transfer: &Transfer,
        credited: u128,
    ) -> Result<MatchOutcome, ScanError> {
        self.db
            .settle_order_payment(order, &payment_record(order, transfer, credited))
            .await?;
        debug!(
            "[{}] tx {} settled order {}",
            self.chain, transfer.tx_hash, order.order_id
        );
        Ok(MatchOutcome::Settled {
            order_id: order.order_id.clone(),
        })
    }
}

fn payment_record(order: &orders::Model, transfer: &Transfer, amount: u128) -> PaymentRecord {
    PaymentRecord {
        pay_hash: transfer.tx_hash.clone(),
        order_id: order.order_id.clone(),
        pay_address: transfer.from.clone().unwrap_or_default(),
        algorithm_id: order.algorithm_id,
        timestamp: transfer.timestamp_ms,
        amount,
        pay_token_id: transfer.token_id,
    }
}
