//! Bulk order intake.
//!
//! Text lines of the form `phone amount` (whitespace or comma separated)
//! are routed to a carrier by phone prefix and matched to that carrier's
//! standard bundle of the requested size. Each valid line is then bought
//! through `LedgerEngine::purchase`, independently of the others.

use crate::{
    config::NetworkPrefixTable,
    ledger::LedgerEngine,
    records::{Bundle, Provider},
    types::{EntityId, Money},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a line was not turned into an order.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum BulkRejection {
    #[error("Invalid format. Use: Phone Amount")]
    InvalidFormat,
    #[error("Invalid phone length")]
    InvalidPhoneLength { phone: String },
    #[error("Unknown network prefix")]
    UnknownNetwork { phone: String },
    #[error("No {provider} bundle for {amount}GB")]
    NoBundle { provider: Provider, amount: String },
}

/// A line resolved to a concrete bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkOrder {
    /// 1-based line number in the submitted text.
    pub line:        usize,
    pub phone:       String,
    pub provider:    Provider,
    pub bundle_id:   EntityId,
    pub bundle_name: String,
    /// Catalog price; the wallet is charged the buyer's effective price.
    pub base_price:  Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedLine {
    pub line:   usize,
    pub raw:    String,
    pub reason: BulkRejection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkPreview {
    pub orders:   Vec<BulkOrder>,
    pub rejected: Vec<RejectedLine>,
}

impl BulkPreview {
    /// Sum of catalog prices over the valid lines.
    pub fn base_total(&self) -> Money {
        self.orders
            .iter()
            .fold(Decimal::ZERO, |total, o| total.saturating_add(o.base_price))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkLineOutcome {
    pub line:           usize,
    pub phone:          String,
    pub bundle_id:      EntityId,
    pub transaction_id: Option<EntityId>,
    pub error:          Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub charged:   Money,
    pub outcomes:  Vec<BulkLineOutcome>,
}

pub fn parse_bulk_orders(
    text: &str,
    networks: &NetworkPrefixTable,
    bundles: &[Bundle],
) -> BulkPreview {
    let mut preview = BulkPreview::default();
    for (idx, raw) in text.lines().enumerate() {
        if raw.trim().is_empty() {
            continue;
        }
        let line = idx + 1;
        match parse_line(raw, networks, bundles) {
            Ok((phone, provider, bundle)) => preview.orders.push(BulkOrder {
                line,
                phone,
                provider,
                bundle_id:   bundle.id.clone(),
                bundle_name: bundle.name.clone(),
                base_price:  bundle.price,
            }),
            Err(reason) => preview.rejected.push(RejectedLine {
                line,
                raw: raw.to_string(),
                reason,
            }),
        }
    }
    log::debug!(
        "bulk: parsed {} orders, {} rejected lines",
        preview.orders.len(),
        preview.rejected.len()
    );
    preview
}

fn parse_line<'b>(
    raw: &str,
    networks: &NetworkPrefixTable,
    bundles: &'b [Bundle],
) -> Result<(String, Provider, &'b Bundle), BulkRejection> {
    let mut parts = raw
        .trim()
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|p| !p.is_empty());
    let (Some(raw_phone), Some(amount)) = (parts.next(), parts.next()) else {
        return Err(BulkRejection::InvalidFormat);
    };

    let phone = NetworkPrefixTable::normalize_phone(raw_phone);
    if phone.chars().count() < networks.min_phone_length {
        return Err(BulkRejection::InvalidPhoneLength { phone });
    }
    let provider = networks
        .provider_for(&phone)
        .ok_or_else(|| BulkRejection::UnknownNetwork { phone: phone.clone() })?;

    let wanted = size_key(amount);
    let bundle = bundles
        .iter()
        .filter(|b| b.provider == provider && !b.is_console())
        .find(|b| size_key(&b.data_amount) == wanted)
        .ok_or_else(|| BulkRejection::NoBundle { provider, amount: amount.to_string() })?;
    Ok((phone, provider, bundle))
}

/// `"5gb"`, `"5GB"` and `"5"` all compare equal.
fn size_key(amount: &str) -> String {
    amount.to_uppercase().replace("GB", "").trim().to_string()
}

/// Buy every order for `user_id`. One line failing never stops the rest.
pub fn process_bulk(engine: &LedgerEngine, user_id: &str, orders: &[BulkOrder]) -> BulkReport {
    let mut report = BulkReport { attempted: orders.len(), ..Default::default() };
    for order in orders {
        let outcome = match engine.purchase(user_id, &order.bundle_id, Some(&order.phone)) {
            Ok(tx) => {
                report.succeeded += 1;
                report.charged = report.charged.saturating_add(tx.amount);
                BulkLineOutcome {
                    line:           order.line,
                    phone:          order.phone.clone(),
                    bundle_id:      order.bundle_id.clone(),
                    transaction_id: Some(tx.id),
                    error:          None,
                }
            }
            Err(e) => {
                log::warn!("bulk: line {} for {} failed: {e}", order.line, order.phone);
                BulkLineOutcome {
                    line:           order.line,
                    phone:          order.phone.clone(),
                    bundle_id:      order.bundle_id.clone(),
                    transaction_id: None,
                    error:          Some(e.to_string()),
                }
            }
        };
        report.outcomes.push(outcome);
    }
    log::info!(
        "bulk: user={user_id} processed {}/{} orders, charged {}",
        report.succeeded,
        report.attempted,
        report.charged
    );
    report
}
