mod support;

use std::sync::Arc;

use common::alert::Alert;
use database::{
    entities::sea_orm_active_enums::{OrderStatus, PayStatus, RefundStatus},
    DbClient, NewOrder,
};
use generic_indexer::{MatchOutcome, PaymentMatcher};
use support::*;

async fn order(db: &DbClient, amount: u128, created_at_ms: i64) -> String {
    db.create_order(NewOrder {
        business_id: "shop".to_string(),
        pay_address: MERCHANT.to_string(),
        algorithm_id: 3,
        amount,
        pay_token_id: TOKEN,
        created_at_ms,
    })
    .await
    .unwrap()
    .order_id
}

fn matcher(db: &Arc<DbClient>) -> (PaymentMatcher, RecordingAlerter) {
    let alerter = RecordingAlerter::default();
    let matcher = PaymentMatcher::new("mockchain", Arc::clone(db), Arc::new(alerter.clone()));
    (matcher, alerter)
}

#[tokio::test]
async fn tagged_overpayment_credits_order_amount() {
    let db = setup_db().await;
    let order_id = order(&db, 500, 1).await;
    let (matcher, alerter) = matcher(&db);

    let outcome = matcher
        .match_transfer(&transfer("0xtx", 750, Some(&order_id)))
        .await
        .unwrap();
    assert_eq!(outcome, MatchOutcome::Settled { order_id: order_id.clone() });

    let payment = db.get_payment("0xtx").await.unwrap().unwrap();
    assert_eq!(payment.amount, "500");
    assert_eq!(payment.algorithm_id, 3);
    assert_eq!(payment.pay_address, "0xpayer");
    assert!(db.get_notice(&order_id).await.unwrap().is_some());
    assert!(alerter.alerts().is_empty());
}

#[tokio::test]
async fn replayed_transfer_is_idempotent() {
    let db = setup_db().await;
    let order_id = order(&db, 500, 1).await;
    let (matcher, _) = matcher(&db);
    let tx = transfer("0xtx", 500, Some(&order_id));

    matcher.match_transfer(&tx).await.unwrap();
    matcher.match_transfer(&tx).await.unwrap();

    assert_eq!(db.payments_for_order(&order_id).await.unwrap().len(), 1);
    assert_eq!(db.list_pending_notices(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn tagged_underpayment_records_mismatch() {
    let db = setup_db().await;
    let order_id = order(&db, 500, 1).await;
    let (matcher, _) = matcher(&db);

    let outcome = matcher
        .match_transfer(&transfer("0xshort", 499, Some(&order_id)))
        .await
        .unwrap();
    assert_eq!(outcome, MatchOutcome::Mismatch { order_id: order_id.clone() });

    let order = db.get_order_by_id(&order_id).await.unwrap().unwrap();
    assert_eq!(order.pay_status, PayStatus::Unpaid);
    let payment = db.get_payment("0xshort").await.unwrap().unwrap();
    assert_eq!(payment.refund_status, RefundStatus::UnRefunded);
    assert_eq!(payment.amount, "499");
    assert!(db.get_notice(&order_id).await.unwrap().is_none());
}

#[tokio::test]
async fn payment_to_cancelled_order_is_refunded() {
    let db = setup_db().await;
    let order_id = order(&db, 500, 1).await;
    db.set_order_status(&order_id, OrderStatus::Cancelled)
        .await
        .unwrap();
    let (matcher, _) = matcher(&db);

    let outcome = matcher
        .match_transfer(&transfer("0xlate", 500, Some(&order_id)))
        .await
        .unwrap();
    assert_eq!(outcome, MatchOutcome::Mismatch { order_id: order_id.clone() });
    let payment = db.get_payment("0xlate").await.unwrap().unwrap();
    assert_eq!(payment.refund_status, RefundStatus::UnRefunded);
}

#[tokio::test]
async fn tag_for_other_recipient_or_token_is_ignored() {
    let db = setup_db().await;
    let order_id = order(&db, 500, 1).await;
    let (matcher, alerter) = matcher(&db);

    let mut elsewhere = transfer("0xa", 500, Some(&order_id));
    elsewhere.to = "0xsomeoneelse".to_string();
    assert_eq!(
        matcher.match_transfer(&elsewhere).await.unwrap(),
        MatchOutcome::Ignored
    );

    let mut wrong_token = transfer("0xb", 500, Some(&order_id));
    wrong_token.token_id = TOKEN + 1;
    assert_eq!(
        matcher.match_transfer(&wrong_token).await.unwrap(),
        MatchOutcome::Ignored
    );

    let unknown = "ab".repeat(32);
    assert_eq!(
        matcher
            .match_transfer(&transfer("0xc", 500, Some(&unknown)))
            .await
            .unwrap(),
        MatchOutcome::Ignored
    );

    assert!(db.payments_for_order(&order_id).await.unwrap().is_empty());
    assert!(alerter.alerts().is_empty());
}

#[tokio::test]
async fn heuristic_match_settles_newest_order() {
    let db = setup_db().await;
    let older = order(&db, 500, 1).await;
    let newer = order(&db, 500, 2).await;
    let (matcher, _) = matcher(&db);

    let outcome = matcher
        .match_transfer(&transfer("0xplain", 500, None))
        .await
        .unwrap();
    assert_eq!(outcome, MatchOutcome::Settled { order_id: newer.clone() });

    let newer = db.get_order_by_id(&newer).await.unwrap().unwrap();
    let older = db.get_order_by_id(&older).await.unwrap().unwrap();
    assert_eq!(newer.pay_status, PayStatus::Paid);
    assert_eq!(older.pay_status, PayStatus::Unpaid);
}

#[tokio::test]
async fn unmatched_transfer_is_alerted() {
    let db = setup_db().await;
    order(&db, 500, 1).await;
    let (matcher, alerter) = matcher(&db);

    let outcome = matcher
        .match_transfer(&transfer("0xstray", 123, None))
        .await
        .unwrap();
    assert_eq!(outcome, MatchOutcome::Unmatched);
    assert!(db.get_payment("0xstray").await.unwrap().is_none());

    let alerts = alerter.alerts();
    assert_eq!(alerts.len(), 1);
    match &alerts[0] {
        Alert::UnmatchedTransfer {
            tx_hash,
            sender,
            amount,
            ..
        } => {
            assert_eq!(tx_hash, "0xstray");
            assert_eq!(sender.as_deref(), Some("0xpayer"));
            assert_eq!(amount, "123");
        }
        other => panic!("unexpected alert {:?}", other),
    }
}

#[tokio::test]
async fn untagged_payments_fill_open_orders_newest_first() {
    let db = setup_db().await;
    let older = order(&db, 500, 1).await;
    let newer = order(&db, 500, 2).await;
    let (matcher, alerter) = matcher(&db);

    let first = transfer("0xpay1", 500, None);
    assert_eq!(
        matcher.match_transfer(&first).await.unwrap(),
        MatchOutcome::Settled { order_id: newer.clone() }
    );
    assert_eq!(
        matcher
            .match_transfer(&transfer("0xpay2", 500, None))
            .await
            .unwrap(),
        MatchOutcome::Settled { order_id: older.clone() }
    );

    // Replaying the first payment neither moves it nor alerts.
    assert_eq!(
        matcher.match_transfer(&first).await.unwrap(),
        MatchOutcome::Settled { order_id: newer.clone() }
    );

    for order_id in [&older, &newer] {
        let order = db.get_order_by_id(order_id).await.unwrap().unwrap();
        assert_eq!(order.pay_status, PayStatus::Paid);
    }
    for pay_hash in ["0xpay1", "0xpay2"] {
        let payment = db.get_payment(pay_hash).await.unwrap().unwrap();
        assert_eq!(payment.refund_status, RefundStatus::Default);
    }
    assert!(alerter.alerts().is_empty());

    // Nothing left to pay.
    assert_eq!(
        matcher
            .match_transfer(&transfer("0xpay3", 500, None))
            .await
            .unwrap(),
        MatchOutcome::Unmatched
    );
    assert_eq!(alerter.alerts().len(), 1);
}

#[tokio::test]
async fn second_transfer_of_same_tx_is_alerted() {
    let db = setup_db().await;
    let order_id = order(&db, 500, 1).await;
    let (matcher, alerter) = matcher(&db);

    let mut other = transfer("0xmulti", 300, None);
    other.to = "0xsecondmerchant".to_string();
    let outcomes = matcher
        .process_block(&block(
            5,
            vec![transfer("0xmulti", 500, Some(&order_id)), other],
        ))
        .await
        .unwrap();

    assert_eq!(
        outcomes,
        vec![
            MatchOutcome::Settled { order_id: order_id.clone() },
            MatchOutcome::Unmatched
        ]
    );
    let payment = db.get_payment("0xmulti").await.unwrap().unwrap();
    assert_eq!(payment.order_id, order_id);
    assert_eq!(payment.amount, "500");

    let alerts = alerter.alerts();
    assert_eq!(alerts.len(), 1);
    assert!(matches!(
        &alerts[0],
        Alert::UnmatchedTransfer { recipient, .. } if recipient == "0xsecondmerchant"
    ));
}
