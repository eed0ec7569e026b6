//! Snapshot serialization: full store state to/from JSON.
//!
//! Two input layouts are accepted:
//!   - the current document (`schema_version`, typed records), and
//!   - the legacy v1 layout: four loosely-typed camelCase collections
//!     keyed `falcon_users`, `falcon_bundles`, `falcon_transactions` and
//!     `falcon_session`, with balances that may be missing.
//!
//! Legacy input is migrated once into typed records. Missing balances
//! become zero, currency amounts are rounded to 2 dp, and fields the
//! schema does not model are kept in `User::extra`.
//!
//! Imports only go into an empty store and commit as one transaction.

use crate::{
    clock::LedgerClock,
    error::{LedgerError, LedgerResult},
    event::LedgerEvent,
    records::{Bundle, BundleCategory, Role, Session, Transaction, TransactionKind, TxStatus, User},
    store::{LedgerStore, SCHEMA_VERSION},
    types::{EntityId, Money},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

pub const LEGACY_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub schema_version: u32,
    pub exported_at:    DateTime<Utc>,
    pub users:          Vec<User>,
    pub bundles:        Vec<Bundle>,
    /// Newest first, as listed by the store.
    pub transactions:   Vec<Transaction>,
    pub session:        Option<Session>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub source_version: u32,
    pub users:          usize,
    pub bundles:        usize,
    pub transactions:   usize,
}

// ── Legacy v1 layout ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LegacySnapshot {
    #[serde(rename = "falcon_users", default)]
    users:        Vec<LegacyUser>,
    #[serde(rename = "falcon_bundles", default)]
    bundles:      Vec<LegacyBundle>,
    #[serde(rename = "falcon_transactions", default)]
    transactions: Vec<LegacyTransaction>,
    #[serde(rename = "falcon_session", default)]
    session:      Option<LegacySession>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyUser {
    id:                 EntityId,
    email:              String,
    #[serde(default)]
    name:               String,
    #[serde(default)]
    username:           Option<String>,
    #[serde(default)]
    phone_number:       String,
    #[serde(default)]
    role:               Option<String>,
    #[serde(default)]
    password:           String,
    #[serde(default)]
    api_key:            Option<String>,
    #[serde(default)]
    wallet_balance:     Option<Number>,
    #[serde(default)]
    profit_balance:     Option<Number>,
    #[serde(default)]
    console_balance:    Option<Number>,
    #[serde(default)]
    parent_id:          Option<EntityId>,
    #[serde(default)]
    shop_name:          Option<String>,
    #[serde(default)]
    shop_slug:          Option<String>,
    #[serde(default)]
    shop_support_phone: Option<String>,
    #[serde(default)]
    shop_prices:        Option<BTreeMap<EntityId, Number>>,
    #[serde(default)]
    agent_prices:       Option<BTreeMap<EntityId, Number>>,
    #[serde(flatten)]
    extra:              BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyBundle {
    id:          EntityId,
    provider:    String,
    name:        String,
    price:       Number,
    data_amount: String,
    #[serde(default)]
    validity:    String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    category:    Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyTransaction {
    id:          EntityId,
    user_id:     EntityId,
    #[serde(rename = "type")]
    kind:        String,
    amount:      Number,
    date:        String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    status:      Option<String>,
    #[serde(default)]
    bundle_id:   Option<EntityId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacySession {
    user_id: EntityId,
    token:   String,
}

fn decimal_of(n: &Number) -> LedgerResult<Decimal> {
    let text = n.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|e| LedgerError::validation(format!("bad number {text}: {e}")))
}

fn legacy_money(n: Option<&Number>) -> LedgerResult<Money> {
    match n {
        Some(n) => Ok(decimal_of(n)?.round_dp(2)),
        None => Ok(Decimal::ZERO),
    }
}

fn legacy_prices(map: Option<BTreeMap<EntityId, Number>>) -> LedgerResult<BTreeMap<EntityId, Money>> {
    map.unwrap_or_default()
        .into_iter()
        .map(|(k, v)| -> LedgerResult<(EntityId, Money)> { Ok((k, decimal_of(&v)?.round_dp(2))) })
        .collect()
}

impl LegacySnapshot {
    /// Convert to typed records. `now` stamps records the legacy layout
    /// never dated (users, the session).
    pub fn migrate(self, now: DateTime<Utc>) -> LedgerResult<StoreSnapshot> {
        let users = self
            .users
            .into_iter()
            .map(|u| -> LedgerResult<User> {
                let username = u.username.filter(|s| !s.trim().is_empty()).unwrap_or_else(|| u.id.clone());
                let role = match u.role.as_deref() {
                    Some(r) => r.parse()?,
                    None => Role::User,
                };
                let shop_slug = match (&u.shop_slug, &u.parent_id) {
                    (Some(slug), _) => Some(slug.clone()),
                    (None, None) => Some(username.clone()),
                    (None, Some(_)) => None,
                };
                Ok(User {
                    wallet_balance:     legacy_money(u.wallet_balance.as_ref())?,
                    profit_balance:     legacy_money(u.profit_balance.as_ref())?,
                    console_balance:    match &u.console_balance {
                        Some(n) => decimal_of(n)?,
                        None => Decimal::ZERO,
                    },
                    shop_prices:        legacy_prices(u.shop_prices)?,
                    agent_prices:       legacy_prices(u.agent_prices)?,
                    id:                 u.id,
                    name:               u.name,
                    username,
                    email:              u.email,
                    phone_number:       u.phone_number,
                    role,
                    password:           u.password,
                    api_key:            u.api_key.filter(|k| !k.is_empty()),
                    parent_id:          u.parent_id.filter(|p| !p.is_empty()),
                    shop_name:          u.shop_name,
                    shop_slug,
                    shop_support_phone: u.shop_support_phone,
                    created_at:         now,
                    version:            0,
                    extra:              u.extra,
                })
            })
            .collect::<LedgerResult<Vec<_>>>()?;

        let bundles = self
            .bundles
            .into_iter()
            .map(|b| -> LedgerResult<Bundle> {
                Ok(Bundle {
                    id:          b.id,
                    provider:    b.provider.parse()?,
                    name:        b.name,
                    price:       decimal_of(&b.price)?.round_dp(2),
                    data_amount: b.data_amount,
                    validity:    b.validity,
                    description: b.description,
                    category:    match b.category.as_deref() {
                        Some(c) => c.parse()?,
                        None => BundleCategory::Standard,
                    },
                })
            })
            .collect::<LedgerResult<Vec<_>>>()?;

        let transactions = self
            .transactions
            .into_iter()
            .map(|t| -> LedgerResult<Transaction> {
                let kind: TransactionKind = t.kind.parse()?;
                let amount = decimal_of(&t.amount)?;
                let created_at = DateTime::parse_from_rfc3339(&t.date)
                    .map(|d| d.with_timezone(&Utc))
                    .map_err(|e| LedgerError::validation(format!("transaction {}: bad date: {e}", t.id)))?;
                Ok(Transaction {
                    id: t.id,
                    user_id: t.user_id,
                    kind,
                    amount: if kind.amount_is_data() { amount } else { amount.round_dp(2) },
                    created_at,
                    description: t.description,
                    status: match t.status.as_deref() {
                        Some(s) => s.parse()?,
                        None => TxStatus::Completed,
                    },
                    bundle_id: t.bundle_id,
                })
            })
            .collect::<LedgerResult<Vec<_>>>()?;

        let session = self.session.map(|s| Session {
            token:      s.token,
            user_id:    s.user_id,
            created_at: now,
        });

        Ok(StoreSnapshot {
            schema_version: LEGACY_SCHEMA_VERSION,
            exported_at: now,
            users,
            bundles,
            transactions,
            session,
        })
    }
}

// ── Export / import ───────────────────────────────────────────────

pub fn export_snapshot(store: &LedgerStore, clock: &LedgerClock) -> LedgerResult<StoreSnapshot> {
    let snapshot = store.read(|db| {
        Ok(StoreSnapshot {
            schema_version: SCHEMA_VERSION,
            exported_at:    clock.now(),
            users:          db.all_users()?,
            bundles:        db.all_bundles()?,
            transactions:   db.all_transactions()?,
            session:        db.current_session()?,
        })
    })?;
    log::info!(
        "snapshot: exported {} users, {} bundles, {} transactions",
        snapshot.users.len(),
        snapshot.bundles.len(),
        snapshot.transactions.len()
    );
    Ok(snapshot)
}

/// Parse either layout into a typed snapshot.
pub fn parse_snapshot(json: &str, now: DateTime<Utc>) -> LedgerResult<StoreSnapshot> {
    let value: Value = serde_json::from_str(json)?;
    if value.get("falcon_users").is_some() || value.get("falcon_bundles").is_some() {
        let legacy: LegacySnapshot = serde_json::from_value(value)?;
        return legacy.migrate(now);
    }
    let snapshot: StoreSnapshot = serde_json::from_value(value)?;
    if snapshot.schema_version > SCHEMA_VERSION {
        return Err(LedgerError::validation(format!(
            "snapshot schema {} is newer than this build ({SCHEMA_VERSION})",
            snapshot.schema_version
        )));
    }
    Ok(snapshot)
}

pub fn import_snapshot(
    store: &LedgerStore,
    clock: &LedgerClock,
    json: &str,
) -> LedgerResult<ImportSummary> {
    let snapshot = parse_snapshot(json, clock.now())?;
    let source_version = snapshot.schema_version;

    let known: HashMap<&str, &User> = snapshot.users.iter().map(|u| (u.id.as_str(), u)).collect();
    if let Some(orphan) = snapshot
        .transactions
        .iter()
        .find(|t| !known.contains_key(t.user_id.as_str()))
    {
        return Err(LedgerError::validation(format!(
            "transaction {} belongs to unknown user {}",
            orphan.id, orphan.user_id
        )));
    }

    store.atomically(|db| {
        if db.user_count()? > 0 || db.bundle_count()? > 0 || db.transaction_count()? > 0 {
            return Err(LedgerError::validation("snapshots can only be imported into an empty store"));
        }

        // Parents are linked after every row exists.
        for user in &snapshot.users {
            if db.find_user_by_email(&user.email)?.is_some() {
                return Err(LedgerError::DuplicateIdentity { field: "email", value: user.email.clone() });
            }
            if db.username_taken(&user.username)? {
                return Err(LedgerError::DuplicateIdentity {
                    field: "username",
                    value: user.username.clone(),
                });
            }
            db.insert_user(&User { parent_id: None, ..user.clone() })?;
        }
        for user in &snapshot.users {
            let Some(parent_id) = user.parent_id.as_deref() else { continue };
            match known.get(parent_id) {
                Some(parent) if parent.parent_id.is_none() && parent.id != user.id => {
                    db.link_parent(&user.id, parent_id)?;
                }
                _ => {
                    log::warn!("snapshot: dropping parent {parent_id} of user {}", user.id);
                    db.append_event(
                        clock.now(),
                        &LedgerEvent::ParentReferenceDropped {
                            user_id:   user.id.clone(),
                            parent_id: parent_id.to_string(),
                        },
                    )?;
                }
            }
        }

        for bundle in &snapshot.bundles {
            db.insert_bundle(bundle)?;
        }
        for tx in snapshot.transactions.iter().rev() {
            db.append_transaction(tx)?;
        }
        if let Some(session) = snapshot.session.as_ref().filter(|s| known.contains_key(s.user_id.as_str())) {
            db.put_session(session)?;
        }

        db.append_event(
            clock.now(),
            &LedgerEvent::SnapshotImported {
                schema_version: source_version,
                users:          snapshot.users.len(),
                transactions:   snapshot.transactions.len(),
            },
        )?;
        Ok(())
    })?;

    log::info!(
        "snapshot: imported v{source_version}: {} users, {} bundles, {} transactions",
        snapshot.users.len(),
        snapshot.bundles.len(),
        snapshot.transactions.len()
    );
    Ok(ImportSummary {
        source_version,
        users: snapshot.users.len(),
        bundles: snapshot.bundles.len(),
        transactions: snapshot.transactions.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn legacy_user_gets_defaults_and_keeps_unknown_fields() {
        let json = r#"{
            "falcon_users": [{
                "id": "u1", "name": "Kofi", "username": "kofi_m", "email": "user@falcon.com",
                "phoneNumber": "0244123456", "password": "password", "role": "USER",
                "walletBalance": 49.999, "favouriteColour": "green"
            }],
            "falcon_transactions": [],
            "falcon_session": null
        }"#;
        let snap = parse_snapshot(json, now()).unwrap();
        assert_eq!(snap.schema_version, LEGACY_SCHEMA_VERSION);
        let user = &snap.users[0];
        assert_eq!(user.wallet_balance, Decimal::new(5000, 2));
        assert_eq!(user.profit_balance, Decimal::ZERO);
        assert_eq!(user.console_balance, Decimal::ZERO);
        assert_eq!(user.shop_slug.as_deref(), Some("kofi_m"));
        assert_eq!(user.extra.get("favouriteColour"), Some(&Value::from("green")));
    }

    #[test]
    fn legacy_transaction_keeps_gb_precision() {
        let json = r#"{
            "falcon_users": [{"id": "u1", "email": "a@b.c", "username": "a"}],
            "falcon_transactions": [
                {"id": "tx-1", "userId": "u1", "type": "CONSOLE_TRANSFER", "amount": 0.125,
                 "date": "2024-05-01T10:00:00.000Z", "description": "Sent", "status": "COMPLETED"},
                {"id": "dep-1", "userId": "u1", "type": "DEPOSIT", "amount": 10.456,
                 "date": "2024-05-01T09:00:00.000Z", "description": "Wallet Deposit", "status": "COMPLETED"}
            ]
        }"#;
        let snap = parse_snapshot(json, now()).unwrap();
        assert_eq!(snap.transactions[0].amount, Decimal::new(125, 3));
        assert_eq!(snap.transactions[1].amount, Decimal::new(1046, 2));
    }

    #[test]
    fn newer_schema_is_rejected() {
        let json = format!(
            r#"{{"schema_version": {}, "exported_at": "2025-01-01T00:00:00Z",
                "users": [], "bundles": [], "transactions": [], "session": null}}"#,
            SCHEMA_VERSION + 1
        );
        assert!(matches!(parse_snapshot(&json, now()), Err(LedgerError::Validation(_))));
    }
}
