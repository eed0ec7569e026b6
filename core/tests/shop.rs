//! Public storefront sales and shop settings.

use bundle_ledger_core::{
    error::LedgerError,
    event::LedgerEvent,
    ledger::ShopSettings,
    session::Registration,
    types::PriceMap,
    Storefront,
};
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

fn public(entries: &[(&str, rust_decimal::Decimal)]) -> ShopSettings {
    ShopSettings {
        shop_name:     "Ama Data Hub".into(),
        public_prices: entries.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        agent_prices:  None,
        support_phone: Some("0509999999".into()),
    }
}

#[test]
fn shop_sale_credits_markup_without_transaction() {
    let front = Storefront::build_test().unwrap();
    let owner = register(&front, "ama");
    front.update_shop_settings(&owner, public(&[("mtn_5gb", dec!(25.00))])).unwrap();

    let sale = front.purchase_from_shop("ama", "mtn_5gb", "0244555666").unwrap();

    assert_eq!(sale.customer_price, dec!(25.00));
    assert_eq!(sale.profit, dec!(4.60));
    let user = front.engine().user(&owner).unwrap();
    assert_eq!(user.profit_balance, dec!(4.60));
    assert_eq!(user.wallet_balance, dec!(0));
    assert!(front.engine().transactions_for(&owner).unwrap().is_empty());

    let events = front.events_of_type("shop_sale_recorded").unwrap();
    assert_eq!(events.len(), 1);
    match events[0].decode().unwrap() {
        LedgerEvent::ShopSaleRecorded { phone_number, below_base, .. } => {
            assert_eq!(phone_number, "0244555666");
            assert!(!below_base);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn unpriced_bundle_sells_at_base_for_no_profit() {
    let front = Storefront::build_test().unwrap();
    let owner = register(&front, "ama");

    let sale = front.purchase_from_shop("AMA", "tele_10gb", "0201234567").unwrap();

    assert_eq!(sale.customer_price, dec!(35.00));
    assert_eq!(sale.profit, dec!(0));
    assert_eq!(front.engine().user(&owner).unwrap().profit_balance, dec!(0));
}

/// The engine itself does not enforce the floor; a below-base sale is
/// flagged in the event log and earns nothing.
#[test]
fn below_base_public_price_is_flagged() {
    let front = Storefront::build_test().unwrap();
    let owner = register(&front, "ama");
    front
        .engine()
        .update_shop_settings(&owner, public(&[("mtn_5gb", dec!(15.00))]))
        .unwrap();

    let sale = front.purchase_from_shop("ama", "mtn_5gb", "0244555666").unwrap();

    assert_eq!(sale.customer_price, dec!(15.00));
    assert_eq!(sale.profit, dec!(0));
    let flagged = front
        .events_of_type("shop_sale_recorded")
        .unwrap()
        .iter()
        .filter_map(|e| e.decode().ok())
        .any(|e| matches!(e, LedgerEvent::ShopSaleRecorded { below_base: true, .. }));
    assert!(flagged);
}

#[test]
fn unknown_shop_or_bundle_is_not_found() {
    let front = Storefront::build_test().unwrap();
    register(&front, "ama");

    assert!(matches!(
        front.purchase_from_shop("nope", "mtn_5gb", "0244555666"),
        Err(LedgerError::NotFound { entity: "shop", .. })
    ));
    assert!(matches!(
        front.purchase_from_shop("ama", "mtn_0gb", "0244555666"),
        Err(LedgerError::NotFound { entity: "bundle", .. })
    ));
}

/// Public prices are replaced wholesale; omitted agent prices and support
/// phone keep their current values.
#[test]
fn settings_overwrite_public_map_and_keep_omitted_fields() {
    let front = Storefront::build_test().unwrap();
    let owner = register(&front, "ama");
    let mut first = public(&[("mtn_5gb", dec!(25.00)), ("mtn_1gb", dec!(5.00))]);
    first.agent_prices = Some(PriceMap::from([("mtn_2gb".to_string(), dec!(9.00))]));
    front.update_shop_settings(&owner, first).unwrap();

    let second = ShopSettings {
        shop_name:     "Ama Data Hub 2".into(),
        public_prices: PriceMap::from([("tele_5gb".to_string(), dec!(21.00))]),
        agent_prices:  None,
        support_phone: None,
    };
    let user = front.update_shop_settings(&owner, second).unwrap();

    assert_eq!(user.shop_name.as_deref(), Some("Ama Data Hub 2"));
    assert_eq!(user.shop_prices.len(), 1);
    assert_eq!(user.shop_prices.get("tele_5gb"), Some(&dec!(21.00)));
    assert_eq!(user.agent_prices.get("mtn_2gb"), Some(&dec!(9.00)));
    assert_eq!(user.shop_support_phone.as_deref(), Some("0509999999"));
    assert_eq!(front.events_of_type("shop_settings_updated").unwrap().len(), 2);
}

#[test]
fn negative_prices_are_rejected_by_the_engine() {
    let front = Storefront::build_test().unwrap();
    let owner = register(&front, "ama");
    assert!(matches!(
        front.engine().update_shop_settings(&owner, public(&[("mtn_5gb", dec!(-1))])),
        Err(LedgerError::Validation(_))
    ));
}

/// A stored price for a bundle the admin has since removed does not block
/// resubmitting the rest of the map.
#[test]
fn retired_bundle_price_does_not_block_settings() {
    let front = Storefront::build_test().unwrap();
    let owner = register(&front, "ama");
    let prices = public(&[("mtn_1gb", dec!(5.00)), ("mtn_2gb", dec!(9.00))]);
    front.update_shop_settings(&owner, prices.clone()).unwrap();

    front.engine().delete_bundle("mtn_1gb").unwrap();

    let user = front.update_shop_settings(&owner, prices).unwrap();
    assert_eq!(user.shop_prices.get("mtn_2gb"), Some(&dec!(9.00)));
}

#[test]
fn zero_public_price_sells_at_base() {
    let front = Storefront::build_test().unwrap();
    let owner = register(&front, "ama");
    front
        .engine()
        .update_shop_settings(&owner, public(&[("mtn_5gb", dec!(0))]))
        .unwrap();

    let sale = front.purchase_from_shop("ama", "mtn_5gb", "0244555666").unwrap();

    assert_eq!(sale.customer_price, dec!(20.40));
    assert_eq!(sale.profit, dec!(0));
    let below = front
        .events_of_type("shop_sale_recorded")
        .unwrap()
        .iter()
        .filter_map(|e| e.decode().ok())
        .any(|e| matches!(e, LedgerEvent::ShopSaleRecorded { below_base: true, .. }));
    assert!(!below);
}
