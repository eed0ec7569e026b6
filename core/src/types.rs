//! Shared primitive types used across the ledger.

use rust_decimal::Decimal;

/// A stable, unique identifier for any stored record.
pub type EntityId = String;

/// A currency amount (wallet, profit, prices).
pub type Money = Decimal;

/// A data quantity in gigabytes (console balance, console transfers).
pub type Gigabytes = Decimal;

/// Bundle id -> price. Ordered so serialized maps are stable.
pub type PriceMap = std::collections::BTreeMap<EntityId, Money>;
