//! Concurrent callers never lose updates or overdraw a wallet.

use bundle_ledger_core::{records::TransactionKind, session::Registration, Storefront};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::thread;

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

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn parallel_top_ups_all_land() {
    init_logging();
    let front = Arc::new(Storefront::build_test().unwrap());
    let user = register(&front, "busy");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let front = Arc::clone(&front);
            let user = user.clone();
            thread::spawn(move || {
                for _ in 0..25 {
                    front.engine().top_up(&user, dec!(1.00)).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(front.engine().user(&user).unwrap().wallet_balance, dec!(200.00));
    assert_eq!(front.engine().transactions_for(&user).unwrap().len(), 200);
}

/// 50 competing 4.10 purchases against 100.00: exactly 24 succeed.
#[test]
fn parallel_purchases_never_overdraw() {
    init_logging();
    let front = Arc::new(Storefront::build_test().unwrap());
    let user = register(&front, "racer");
    front.engine().top_up(&user, dec!(100)).unwrap();

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let front = Arc::clone(&front);
            let user = user.clone();
            thread::spawn(move || {
                (0..5)
                    .filter(|_| front.engine().purchase(&user, "mtn_1gb", None).is_ok())
                    .count()
            })
        })
        .collect();
    let succeeded: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    assert_eq!(succeeded, 24);
    let wallet = front.engine().user(&user).unwrap().wallet_balance;
    assert_eq!(wallet, dec!(1.60));
    assert!(wallet >= Decimal::ZERO);

    let purchases = front
        .engine()
        .transactions_for(&user)
        .unwrap()
        .into_iter()
        .filter(|t| t.kind == TransactionKind::Purchase)
        .count();
    assert_eq!(purchases, succeeded);
}
