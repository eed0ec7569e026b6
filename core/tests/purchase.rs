//! Wallet purchases: debit, record, ordering and the inclusive boundary.

use bundle_ledger_core::{
    error::{BalanceKind, LedgerError},
    records::{AdjustDirection, TransactionKind, TxStatus},
    session::Registration,
    Storefront,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn register(front: &Storefront, username: &str) -> String {
    front
        .gate()
        .register(Registration {
            name:         username.into(),
            email:        format!("{username}@example.com"),
            password:     "pw".into(),
            username:     username.into(),
            phone_number: "0240000000".into(),
            parent_id:    None,
        })
        .unwrap()
        .id
}

/// A 50.00 wallet buying a 20.40 bundle keeps 29.60 and records one PURCHASE.
#[test]
fn purchase_debits_wallet_and_records_transaction() {
    let front = Storefront::build_test().unwrap();
    let engine = front.engine();

    let tx = engine.purchase("u1", "mtn_5gb", Some("0244000000")).unwrap();

    assert_eq!(engine.user("u1").unwrap().wallet_balance, dec!(29.60));
    assert_eq!(tx.kind, TransactionKind::Purchase);
    assert_eq!(tx.amount, dec!(20.40));
    assert_eq!(tx.status, TxStatus::Completed);
    assert_eq!(tx.bundle_id.as_deref(), Some("mtn_5gb"));
    assert_eq!(tx.description, "Purchased MTN 5GB for 0244000000");

    let history = engine.transactions_for("u1").unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0], tx);
}

/// A wallet holding exactly the price can buy.
#[test]
fn wallet_equal_to_cost_succeeds() {
    let front = Storefront::build_test().unwrap();
    let engine = front.engine();
    let ama = register(&front, "ama");

    engine.top_up(&ama, dec!(20.40)).unwrap();
    engine.purchase(&ama, "mtn_5gb", None).unwrap();

    assert_eq!(engine.user(&ama).unwrap().wallet_balance, dec!(0));
}

#[test]
fn insufficient_wallet_changes_nothing() {
    let front = Storefront::build_test().unwrap();
    let engine = front.engine();

    let err = engine.purchase("u1", "mtn_15gb", None).unwrap_err();
    match err {
        LedgerError::InsufficientBalance { kind, available, required } => {
            assert_eq!(kind, BalanceKind::Wallet);
            assert_eq!(available, dec!(50.00));
            assert_eq!(required, dec!(57.00));
        }
        other => panic!("expected InsufficientBalance, got {other:?}"),
    }
    assert_eq!(engine.user("u1").unwrap().wallet_balance, dec!(50.00));
    assert!(engine.transactions_for("u1").unwrap().is_empty());
}

#[test]
fn transactions_are_listed_newest_first() {
    let front = Storefront::build_test().unwrap();
    let engine = front.engine();
    let kojo = register(&front, "kojo");

    engine.top_up(&kojo, dec!(30)).unwrap();
    engine.purchase(&kojo, "mtn_1gb", None).unwrap();
    engine.purchase(&kojo, "at_2gb", Some("0271234567")).unwrap();

    let kinds: Vec<_> = engine
        .transactions_for(&kojo)
        .unwrap()
        .into_iter()
        .map(|t| (t.kind, t.amount))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (TransactionKind::Purchase, dec!(7.40)),
            (TransactionKind::Purchase, dec!(4.10)),
            (TransactionKind::Deposit, dec!(30)),
        ]
    );
    assert_eq!(engine.user(&kojo).unwrap().wallet_balance, dec!(18.50));
}

#[test]
fn unknown_user_or_bundle_is_not_found() {
    let front = Storefront::build_test().unwrap();
    let engine = front.engine();

    assert!(matches!(
        engine.purchase("nobody", "mtn_1gb", None),
        Err(LedgerError::NotFound { entity: "user", .. })
    ));
    assert!(matches!(
        engine.purchase("u1", "mtn_999gb", None),
        Err(LedgerError::NotFound { entity: "bundle", .. })
    ));
    assert!(engine.transactions_for("u1").unwrap().is_empty());
}

#[test]
fn top_up_rejects_non_positive_amounts() {
    let front = Storefront::build_test().unwrap();
    let engine = front.engine();

    for amount in [dec!(0), dec!(-5)] {
        assert!(matches!(engine.top_up("u1", amount), Err(LedgerError::Validation(_))));
    }
    let tx = engine.top_up("u1", dec!(12.5)).unwrap();
    assert_eq!(tx.kind, TransactionKind::Deposit);
    assert_eq!(tx.description, "Wallet Deposit");
    assert_eq!(engine.user("u1").unwrap().wallet_balance, dec!(62.50));
}

/// Deleting a bundle leaves the history that references it intact.
#[test]
fn deleted_bundle_keeps_history() {
    let front = Storefront::build_test().unwrap();
    let engine = front.engine();

    engine.purchase("u1", "mtn_1gb", None).unwrap();
    engine.delete_bundle("mtn_1gb").unwrap();

    let history = engine.transactions_for("u1").unwrap();
    assert_eq!(history[0].bundle_id.as_deref(), Some("mtn_1gb"));
    assert!(matches!(
        engine.purchase("u1", "mtn_1gb", None),
        Err(LedgerError::NotFound { .. })
    ));
}

/// Credits past the decimal range fail cleanly and write nothing.
#[test]
fn overflowing_credit_is_rejected() {
    let front = Storefront::build_test().unwrap();
    let engine = front.engine();

    assert!(matches!(engine.top_up("u1", Decimal::MAX), Err(LedgerError::Validation(_))));
    assert!(matches!(
        engine.admin_adjust_balance("u1", Decimal::MAX, AdjustDirection::Credit),
        Err(LedgerError::Validation(_))
    ));

    assert_eq!(engine.user("u1").unwrap().wallet_balance, dec!(50.00));
    assert!(engine.transactions_for("u1").unwrap().is_empty());
}
