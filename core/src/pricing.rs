//! Pricing resolver: what a buyer pays for a bundle.
//!
//! All functions here are pure. The owner edge is resolved by the
//! caller through an indexed lookup immediately before pricing, so
//! prices are never reused across operations.

use crate::{
    error::{LedgerError, LedgerResult},
    records::{Bundle, User},
    types::{Money, PriceMap},
};
use rust_decimal::Decimal;

/// Price an agent (or ordinary user) pays from their wallet.
///
/// `owner` is the user's resolved parent, if any. The owner's agent
/// price wins when it exists and is positive; otherwise base price.
/// No floor is applied here: an owner may under-price their agents.
pub fn effective_price(owner: Option<&User>, bundle: &Bundle) -> Money {
    owner
        .and_then(|o| o.agent_prices.get(&bundle.id))
        .copied()
        .filter(|p| *p > Decimal::ZERO)
        .unwrap_or(bundle.price)
}

/// Price an anonymous customer pays on an owner's public storefront.
pub fn shop_price(owner: &User, bundle: &Bundle) -> Money {
    owner
        .shop_prices
        .get(&bundle.id)
        .copied()
        .filter(|p| *p > Decimal::ZERO)
        .unwrap_or(bundle.price)
}

/// Owner's margin on a price: never negative.
pub fn margin_over_base(price: Money, bundle: &Bundle) -> Money {
    (price - bundle.price).max(Decimal::ZERO)
}

/// Caller-side policy: no public or agent price may undercut base price.
/// Entries for bundles no longer in the catalog are not checked.
pub fn check_price_floor(bundles: &[Bundle], prices: &PriceMap, label: &str) -> LedgerResult<()> {
    for (bundle_id, price) in prices {
        let Some(bundle) = bundles.iter().find(|b| &b.id == bundle_id) else {
            log::debug!("pricing: {label} price for retired bundle {bundle_id} not checked");
            continue;
        };
        if *price < bundle.price {
            return Err(LedgerError::validation(format!(
                "{label} price for {} cannot be less than base price ({:.2})",
                bundle.name, bundle.price
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{BundleCategory, Provider, Role};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn bundle(id: &str, price: i64) -> Bundle {
        Bundle {
            id:          id.into(),
            provider:    Provider::Mtn,
            name:        id.to_uppercase(),
            price:       Decimal::new(price, 2),
            data_amount: "1GB".into(),
            validity:    "No Expiry".into(),
            description: String::new(),
            category:    BundleCategory::Standard,
        }
    }

    fn owner(agent: &[(&str, i64)], public: &[(&str, i64)]) -> User {
        let to_map = |entries: &[(&str, i64)]| -> PriceMap {
            entries.iter().map(|(k, v)| (k.to_string(), Decimal::new(*v, 2))).collect()
        };
        User {
            id:                 "owner".into(),
            name:               "Owner".into(),
            username:           "owner".into(),
            email:              "owner@x.com".into(),
            phone_number:       "0240000000".into(),
            role:               Role::User,
            password:           "pw".into(),
            api_key:            None,
            wallet_balance:     Decimal::ZERO,
            profit_balance:     Decimal::ZERO,
            console_balance:    Decimal::ZERO,
            parent_id:          None,
            shop_name:          None,
            shop_slug:          Some("owner".into()),
            shop_support_phone: None,
            shop_prices:        to_map(public),
            agent_prices:       to_map(agent),
            created_at:         Utc::now(),
            version:            0,
            extra:              BTreeMap::new(),
        }
    }

    #[test]
    fn base_price_without_owner() {
        let b = bundle("b1", 1000);
        assert_eq!(effective_price(None, &b), Decimal::new(1000, 2));
    }

    #[test]
    fn agent_price_overrides_even_below_base() {
        let b = bundle("b1", 1000);
        let o = owner(&[("b1", 800)], &[]);
        assert_eq!(effective_price(Some(&o), &b), Decimal::new(800, 2));
    }

    #[test]
    fn zero_agent_price_falls_back_to_base() {
        let b = bundle("b1", 1000);
        let o = owner(&[("b1", 0)], &[]);
        assert_eq!(effective_price(Some(&o), &b), Decimal::new(1000, 2));
    }

    #[test]
    fn margin_is_clamped_at_zero() {
        let b = bundle("b1", 1000);
        assert_eq!(margin_over_base(Decimal::new(1250, 2), &b), Decimal::new(250, 2));
        assert_eq!(margin_over_base(Decimal::new(900, 2), &b), Decimal::ZERO);
    }

    #[test]
    fn shop_price_defaults_to_base() {
        let b = bundle("b1", 1000);
        let o = owner(&[], &[("b2", 2000)]);
        assert_eq!(shop_price(&o, &b), Decimal::new(1000, 2));
    }

    #[test]
    fn zero_shop_price_falls_back_to_base() {
        let b = bundle("b1", 1000);
        let o = owner(&[], &[("b1", 0)]);
        assert_eq!(shop_price(&o, &b), Decimal::new(1000, 2));
    }

    #[test]
    fn floor_check_skips_retired_bundles() {
        let catalog = vec![bundle("b1", 1000)];
        let prices: PriceMap = [
            ("b1".to_string(), Decimal::new(1200, 2)),
            ("gone".to_string(), Decimal::new(1, 2)),
        ]
        .into();
        assert!(check_price_floor(&catalog, &prices, "Public").is_ok());
    }

    #[test]
    fn floor_check_rejects_undercut() {
        let catalog = vec![bundle("b1", 1000)];
        let ok: PriceMap = [("b1".to_string(), Decimal::new(1000, 2))].into();
        let low: PriceMap = [("b1".to_string(), Decimal::new(999, 2))].into();
        assert!(check_price_floor(&catalog, &ok, "Public").is_ok());
        assert!(matches!(
            check_price_floor(&catalog, &low, "Agent"),
            Err(LedgerError::Validation(_))
        ));
    }
}
