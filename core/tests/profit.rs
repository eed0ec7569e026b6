//! Profit cashout.

use bundle_ledger_core::{
    error::{BalanceKind, LedgerError},
    ledger::ShopSettings,
    records::TransactionKind,
    session::Registration,
    Storefront,
};
use rust_decimal_macros::dec;

fn register(front: &Storefront, username: &str, parent: Option<&str>) -> String {
    front
        .gate()
        .register(Registration {
            name:         username.into(),
            email:        format!("{username}@example.com"),
            password:     "pw".into(),
            username:     username.into(),
            phone_number: "0240000000".into(),
            parent_id:    parent.map(Into::into),
        })
        .unwrap()
        .id
}

/// Owner with 4.60 profit: one agent sale at 25.00 on a 20.40 bundle.
fn owner_with_profit(front: &Storefront) -> String {
    let engine = front.engine();
    let owner = register(front, "owner", None);
    let agent = register(front, "agent", Some(&owner));
    front
        .update_shop_settings(
            &owner,
            ShopSettings {
                shop_name:     "Owner Data".into(),
                public_prices: Default::default(),
                agent_prices:  Some([("mtn_5gb".to_string(), dec!(25.00))].into()),
                support_phone: None,
            },
        )
        .unwrap();
    engine.top_up(&agent, dec!(25)).unwrap();
    engine.purchase(&agent, "mtn_5gb", None).unwrap();
    owner
}

#[test]
fn cashout_moves_all_profit_to_wallet() {
    let front = Storefront::build_test().unwrap();
    let engine = front.engine();
    let owner = owner_with_profit(&front);
    engine.top_up(&owner, dec!(1)).unwrap();

    let tx = engine.cashout_profit(&owner).unwrap();

    let user = engine.user(&owner).unwrap();
    assert_eq!(tx.kind, TransactionKind::ProfitCashout);
    assert_eq!(tx.amount, dec!(4.60));
    assert_eq!(user.profit_balance, dec!(0));
    assert_eq!(user.wallet_balance, dec!(5.60));
}

/// A second cashout finds nothing to move and records nothing.
#[test]
fn second_cashout_fails() {
    let front = Storefront::build_test().unwrap();
    let engine = front.engine();
    let owner = owner_with_profit(&front);

    engine.cashout_profit(&owner).unwrap();
    let err = engine.cashout_profit(&owner).unwrap_err();

    assert!(matches!(
        err,
        LedgerError::InsufficientBalance { kind: BalanceKind::Profit, .. }
    ));
    assert_eq!(engine.transactions_for(&owner).unwrap().len(), 1);
    assert_eq!(engine.user(&owner).unwrap().wallet_balance, dec!(4.60));
}

#[test]
fn cashout_without_profit_fails() {
    let front = Storefront::build_test().unwrap();
    assert!(matches!(
        front.engine().cashout_profit("u1"),
        Err(LedgerError::InsufficientBalance { kind: BalanceKind::Profit, .. })
    ));
    assert!(front.engine().transactions_for("u1").unwrap().is_empty());
}
