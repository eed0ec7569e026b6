//! Tagged JSON command dispatch through `Storefront::execute`.

use bundle_ledger_core::{
    command::LedgerCommand,
    error::{AuthFailure, LedgerError},
    Storefront,
};
use serde_json::json;

fn run(front: &Storefront, value: serde_json::Value) -> Result<serde_json::Value, LedgerError> {
    let cmd: LedgerCommand = serde_json::from_value(value).unwrap();
    front.execute(cmd)
}

#[test]
fn session_commands_act_as_the_logged_in_user() {
    let front = Storefront::build_test().unwrap();

    assert!(matches!(
        run(&front, json!({"cmd": "top_up", "amount": "10"})),
        Err(LedgerError::AuthenticationFailure(AuthFailure::NoSession))
    ));

    run(&front, json!({"cmd": "login", "email": "user@falcon.com", "password": "password"})).unwrap();
    let tx = run(&front, json!({"cmd": "purchase", "bundle_id": "mtn_2gb", "phone": "0244000000"})).unwrap();
    assert_eq!(tx["kind"], "PURCHASE");
    assert_eq!(tx["user_id"], "u1");

    let session = run(&front, json!({"cmd": "get_session"})).unwrap();
    assert_eq!(session["wallet_balance"], "41.80");

    let history = run(&front, json!({"cmd": "transactions"})).unwrap();
    assert_eq!(history.as_array().unwrap().len(), 1);
}

#[test]
fn register_then_shop_flow() {
    let front = Storefront::build_test().unwrap();

    let owner = run(
        &front,
        json!({"cmd": "register", "name": "Ama", "email": "ama@example.com", "password": "pw",
               "username": "ama", "phone_number": "0240000000"}),
    )
    .unwrap();
    assert_eq!(owner["shop_slug"], "ama");

    run(&front, json!({"cmd": "login", "email": "ama@example.com", "password": "pw"})).unwrap();
    run(
        &front,
        json!({"cmd": "update_shop_settings", "shop_name": "Ama Data",
               "public_prices": {"mtn_1gb": "6.00"}}),
    )
    .unwrap();
    run(&front, json!({"cmd": "logout"})).unwrap();

    let sale = run(
        &front,
        json!({"cmd": "purchase_from_shop", "shop_slug": "ama", "bundle_id": "mtn_1gb",
               "phone": "0244999888"}),
    )
    .unwrap();
    assert_eq!(sale["profit"], "1.90");

    let bundles = run(&front, json!({"cmd": "list_bundles"})).unwrap();
    assert!(bundles.as_array().unwrap().len() > 30);
}

#[test]
fn api_commands_use_bearer_keys_not_sessions() {
    let front = Storefront::build_test().unwrap();
    let key = front.gate().generate_api_key("u1").unwrap();

    let balance = run(&front, json!({"cmd": "api_balance", "authorization": format!("Bearer {key}")})).unwrap();
    assert_eq!(balance["currency"], "GHS");
    assert_eq!(balance["wallet_balance"], "50.00");
}
