//! The ledger engine: every balance movement in the storefront.
//!
//! RULES:
//!   - Each operation is one `LedgerStore::atomically` call: read, validate,
//!     mutate, write users, append the transaction, commit.
//!   - Every successful balance change appends exactly one COMPLETED
//!     transaction for the acting user. `purchase_from_shop` is the single
//!     exception: the buyer has no account, so only the owner's profit
//!     moves and the sale goes to the event log.
//!   - A failed operation writes nothing.
//!   - Amounts must be positive; the engine rejects zero and negatives.

use crate::{
    clock::LedgerClock,
    error::{BalanceKind, LedgerError, LedgerResult},
    event::LedgerEvent,
    pricing,
    records::{
        AdjustDirection, Bundle, PublicUser, Transaction, TransactionKind, TxStatus,
    },
    store::{LedgerStore, StoreConn},
    types::{EntityId, Gigabytes, Money, PriceMap},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Result of a sale on an owner's public storefront.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopSale {
    pub owner_id:       EntityId,
    pub bundle_id:      EntityId,
    pub phone_number:   String,
    pub customer_price: Money,
    pub profit:         Money,
}

/// Full replacement of a shop's settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShopSettings {
    pub shop_name:     String,
    pub public_prices: PriceMap,
    /// `None` keeps the current agent prices.
    #[serde(default)]
    pub agent_prices:  Option<PriceMap>,
    /// `None` keeps the current support phone.
    #[serde(default)]
    pub support_phone: Option<String>,
}

pub struct LedgerEngine {
    store: Arc<LedgerStore>,
    clock: Arc<LedgerClock>,
}

impl LedgerEngine {
    pub fn new(store: Arc<LedgerStore>, clock: Arc<LedgerClock>) -> Self {
        Self { store, clock }
    }

    // ── Purchases ─────────────────────────────────────────────────

    /// Buy a bundle from the wallet, optionally for another phone.
    ///
    /// Console bundles credit their GB to the console balance and are
    /// recorded as `CONSOLE_TOPUP`. When the buyer is an agent paying
    /// above base price, the difference is credited to the owner's profit.
    pub fn purchase(
        &self,
        user_id: &str,
        bundle_id: &str,
        phone: Option<&str>,
    ) -> LedgerResult<Transaction> {
        let phone = phone.map(str::trim).filter(|p| !p.is_empty());

        self.store.atomically(|db| {
            let mut user = db.require_user(user_id)?;
            let bundle = require_bundle(db, bundle_id)?;
            let mut owner = match user.parent_id.as_deref() {
                Some(parent_id) => db.find_user(parent_id)?,
                None => None,
            };

            let cost = pricing::effective_price(owner.as_ref(), &bundle);
            if user.wallet_balance < cost {
                log::warn!(
                    "ledger: purchase rejected user={user_id} bundle={bundle_id} wallet={} cost={cost}",
                    user.wallet_balance
                );
                return Err(LedgerError::InsufficientBalance {
                    kind:      BalanceKind::Wallet,
                    available: user.wallet_balance,
                    required:  cost,
                });
            }

            user.wallet_balance -= cost;
            let target = phone.map(|p| format!(" for {p}")).unwrap_or_default();
            let (kind, description) = if bundle.is_console() {
                let gb = bundle.data_gb()?;
                user.console_balance = credited(user.console_balance, gb, "console balance")?;
                (
                    TransactionKind::ConsoleTopup,
                    format!("Console credit {} (+{gb}GB){target}", bundle.name),
                )
            } else {
                (TransactionKind::Purchase, format!("Purchased {}{target}", bundle.name))
            };
            db.save_user(&user)?;

            if let Some(owner) = owner.as_mut() {
                let margin = pricing::margin_over_base(cost, &bundle);
                if margin > Decimal::ZERO {
                    owner.profit_balance = credited(owner.profit_balance, margin, "profit balance")?;
                    db.save_user(owner)?;
                    log::info!(
                        "ledger: agent margin owner={} agent={user_id} bundle={bundle_id} margin={margin}",
                        owner.id
                    );
                }
            }

            let tx = self.record(db, user_id, kind, cost, description, Some(bundle_id))?;
            log::info!(
                "ledger: {} user={user_id} bundle={bundle_id} cost={cost} wallet={}",
                kind.as_str(),
                user.wallet_balance
            );
            Ok(tx)
        })
    }

    /// A sale to an anonymous customer through an owner's storefront.
    /// Payment happens outside the ledger; the owner earns
    /// `max(0, customer price - base price)`.
    pub fn purchase_from_shop(
        &self,
        owner_id: &str,
        bundle_id: &str,
        phone: &str,
    ) -> LedgerResult<ShopSale> {
        let phone = phone.trim();
        if phone.is_empty() {
            return Err(LedgerError::validation("a recipient phone number is required"));
        }

        self.store.atomically(|db| {
            let mut owner = db
                .find_user(owner_id)?
                .ok_or_else(|| LedgerError::not_found("shop", owner_id))?;
            let bundle = require_bundle(db, bundle_id)?;

            let customer_price = pricing::shop_price(&owner, &bundle);
            let profit = pricing::margin_over_base(customer_price, &bundle);
            let below_base = customer_price < bundle.price;
            if below_base {
                log::warn!(
                    "ledger: shop sale below base owner={owner_id} bundle={bundle_id} price={customer_price} base={}",
                    bundle.price
                );
            }

            if profit > Decimal::ZERO {
                owner.profit_balance = credited(owner.profit_balance, profit, "profit balance")?;
                db.save_user(&owner)?;
            }

            db.append_event(
                self.clock.now(),
                &LedgerEvent::ShopSaleRecorded {
                    owner_id:       owner_id.to_string(),
                    bundle_id:      bundle_id.to_string(),
                    phone_number:   phone.to_string(),
                    customer_price,
                    base_price:     bundle.price,
                    profit,
                    below_base,
                },
            )?;
            log::info!(
                "ledger: shop sale owner={owner_id} bundle={bundle_id} price={customer_price} profit={profit}"
            );

            Ok(ShopSale {
                owner_id:     owner_id.to_string(),
                bundle_id:    bundle_id.to_string(),
                phone_number: phone.to_string(),
                customer_price,
                profit,
            })
        })
    }

    // ── Wallet ────────────────────────────────────────────────────

    pub fn top_up(&self, user_id: &str, amount: Money) -> LedgerResult<Transaction> {
        require_positive(amount, "top-up amount")?;
        self.store.atomically(|db| {
            let mut user = db.require_user(user_id)?;
            user.wallet_balance = credited(user.wallet_balance, amount, "wallet balance")?;
            db.save_user(&user)?;
            let tx = self.record(
                db,
                user_id,
                TransactionKind::Deposit,
                amount,
                "Wallet Deposit".to_string(),
                None,
            )?;
            log::info!("ledger: DEPOSIT user={user_id} amount={amount} wallet={}", user.wallet_balance);
            Ok(tx)
        })
    }

    /// Move the whole profit balance into the wallet.
    /// Fails, writing nothing, when there is no profit to move.
    pub fn cashout_profit(&self, user_id: &str) -> LedgerResult<Transaction> {
        self.store.atomically(|db| {
            let mut user = db.require_user(user_id)?;
            let profit = user.profit_balance;
            if profit <= Decimal::ZERO {
                return Err(LedgerError::InsufficientBalance {
                    kind:      BalanceKind::Profit,
                    available: profit,
                    required:  Decimal::new(1, 2),
                });
            }
            user.wallet_balance = credited(user.wallet_balance, profit, "wallet balance")?;
            user.profit_balance = Decimal::ZERO;
            db.save_user(&user)?;
            let tx = self.record(
                db,
                user_id,
                TransactionKind::ProfitCashout,
                profit,
                "Profit cashout to wallet".to_string(),
                None,
            )?;
            log::info!("ledger: PROFIT_CASHOUT user={user_id} amount={profit}");
            Ok(tx)
        })
    }

    pub fn admin_adjust_balance(
        &self,
        user_id: &str,
        amount: Money,
        direction: AdjustDirection,
    ) -> LedgerResult<Transaction> {
        require_positive(amount, "adjustment amount")?;
        self.store.atomically(|db| {
            let mut user = db.require_user(user_id)?;
            let kind = match direction {
                AdjustDirection::Credit => {
                    user.wallet_balance = credited(user.wallet_balance, amount, "wallet balance")?;
                    TransactionKind::AdminCredit
                }
                AdjustDirection::Debit => {
                    if user.wallet_balance < amount {
                        log::warn!(
                            "ledger: admin debit rejected user={user_id} wallet={} amount={amount}",
                            user.wallet_balance
                        );
                        return Err(LedgerError::InsufficientBalance {
                            kind:      BalanceKind::Wallet,
                            available: user.wallet_balance,
                            required:  amount,
                        });
                    }
                    user.wallet_balance -= amount;
                    TransactionKind::AdminDebit
                }
            };
            db.save_user(&user)?;
            let description = match direction {
                AdjustDirection::Credit => "Admin credit",
                AdjustDirection::Debit  => "Admin debit",
            };
            let tx = self.record(db, user_id, kind, amount, description.to_string(), None)?;
            log::info!("ledger: {} user={user_id} amount={amount}", kind.as_str());
            Ok(tx)
        })
    }

    // ── Console ───────────────────────────────────────────────────

    /// Send console credit to a phone. The transaction's `amount` is GB.
    pub fn transfer_console_data(
        &self,
        user_id: &str,
        amount_gb: Gigabytes,
        phone: &str,
    ) -> LedgerResult<Transaction> {
        require_positive(amount_gb, "transfer amount")?;
        let phone = phone.trim();
        if phone.is_empty() {
            return Err(LedgerError::validation("a destination phone number is required"));
        }

        self.store.atomically(|db| {
            let mut user = db.require_user(user_id)?;
            if user.console_balance < amount_gb {
                return Err(LedgerError::InsufficientBalance {
                    kind:      BalanceKind::Console,
                    available: user.console_balance,
                    required:  amount_gb,
                });
            }
            user.console_balance -= amount_gb;
            db.save_user(&user)?;
            let tx = self.record(
                db,
                user_id,
                TransactionKind::ConsoleTransfer,
                amount_gb,
                format!("Sent {amount_gb}GB to {phone}"),
                None,
            )?;
            log::info!(
                "ledger: CONSOLE_TRANSFER user={user_id} gb={amount_gb} remaining={}",
                user.console_balance
            );
            Ok(tx)
        })
    }

    // ── Shop settings ─────────────────────────────────────────────

    /// Replace the owner's price maps wholesale. Price floors are the
    /// caller's policy (see `pricing::check_price_floor`).
    pub fn update_shop_settings(
        &self,
        user_id: &str,
        settings: ShopSettings,
    ) -> LedgerResult<PublicUser> {
        let negative = settings
            .public_prices
            .values()
            .chain(settings.agent_prices.iter().flat_map(|m| m.values()))
            .any(|p| *p < Decimal::ZERO);
        if negative {
            return Err(LedgerError::validation("shop prices cannot be negative"));
        }

        self.store.atomically(|db| {
            let mut user = db.require_user(user_id)?;
            let name = settings.shop_name.trim();
            user.shop_name = (!name.is_empty()).then(|| name.to_string());
            if user.shop_slug.is_none() {
                user.shop_slug = Some(user.username.clone());
            }
            user.shop_prices = settings.public_prices;
            if let Some(agent_prices) = settings.agent_prices {
                user.agent_prices = agent_prices;
            }
            if let Some(phone) = settings.support_phone {
                let phone = phone.trim();
                user.shop_support_phone = (!phone.is_empty()).then(|| phone.to_string());
            }
            user.version = db.save_user(&user)?;

            db.append_event(
                self.clock.now(),
                &LedgerEvent::ShopSettingsUpdated {
                    user_id:      user_id.to_string(),
                    public_count: user.shop_prices.len(),
                    agent_count:  user.agent_prices.len(),
                },
            )?;
            log::info!(
                "ledger: shop settings user={user_id} public={} agent={}",
                user.shop_prices.len(),
                user.agent_prices.len()
            );
            Ok(user.to_public())
        })
    }

    // ── Catalog ───────────────────────────────────────────────────

    pub fn add_bundle(&self, bundle: Bundle) -> LedgerResult<()> {
        if bundle.id.trim().is_empty() {
            return Err(LedgerError::validation("bundle id is required"));
        }
        require_positive(bundle.price, "bundle price")?;
        bundle.data_gb()?;

        self.store.atomically(|db| {
            if db.find_bundle(&bundle.id)?.is_some() {
                return Err(LedgerError::DuplicateIdentity {
                    field: "bundle id",
                    value: bundle.id.clone(),
                });
            }
            db.insert_bundle(&bundle)?;
            db.append_event(
                self.clock.now(),
                &LedgerEvent::BundleAdded { bundle_id: bundle.id.clone(), price: bundle.price },
            )?;
            log::info!("ledger: bundle added id={} price={}", bundle.id, bundle.price);
            Ok(())
        })
    }

    pub fn delete_bundle(&self, bundle_id: &str) -> LedgerResult<()> {
        self.store.atomically(|db| {
            if !db.delete_bundle(bundle_id)? {
                return Err(LedgerError::not_found("bundle", bundle_id));
            }
            db.append_event(
                self.clock.now(),
                &LedgerEvent::BundleDeleted { bundle_id: bundle_id.to_string() },
            )?;
            log::info!("ledger: bundle deleted id={bundle_id}");
            Ok(())
        })
    }

    pub fn list_bundles(&self) -> LedgerResult<Vec<Bundle>> {
        self.store.read(|db| db.all_bundles())
    }

    pub fn bundle(&self, bundle_id: &str) -> LedgerResult<Bundle> {
        self.store.read(|db| require_bundle(db, bundle_id))
    }

    // ── Reads ─────────────────────────────────────────────────────

    pub fn user(&self, user_id: &str) -> LedgerResult<PublicUser> {
        self.store.read(|db| Ok(db.require_user(user_id)?.to_public()))
    }

    /// A user's transactions, newest first.
    pub fn transactions_for(&self, user_id: &str) -> LedgerResult<Vec<Transaction>> {
        self.store.read(|db| db.transactions_for_user(user_id))
    }

    fn record(
        &self,
        db: &StoreConn<'_>,
        user_id: &str,
        kind: TransactionKind,
        amount: Decimal,
        description: String,
        bundle_id: Option<&str>,
    ) -> LedgerResult<Transaction> {
        let tx = Transaction {
            id:          new_transaction_id(),
            user_id:     user_id.to_string(),
            kind,
            amount,
            created_at:  self.clock.now(),
            description,
            status:      TxStatus::Completed,
            bundle_id:   bundle_id.map(str::to_string),
        };
        db.append_transaction(&tx)?;
        Ok(tx)
    }
}

/// Time-ordered transaction id.
pub fn new_transaction_id() -> String {
    format!("tx_{}", Uuid::now_v7().simple())
}

fn require_bundle(db: &StoreConn<'_>, bundle_id: &str) -> LedgerResult<Bundle> {
    db.find_bundle(bundle_id)?
        .ok_or_else(|| LedgerError::not_found("bundle", bundle_id))
}

/// `balance + amount`, or `Validation` when the sum leaves the decimal range.
fn credited(balance: Money, amount: Money, what: &str) -> LedgerResult<Money> {
    balance.checked_add(amount).ok_or_else(|| {
        log::warn!("ledger: {what} overflow adding {amount} to {balance}");
        LedgerError::validation(format!("{what} cannot hold {balance} + {amount}"))
    })
}

fn require_positive(amount: Decimal, what: &str) -> LedgerResult<()> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::validation(format!("{what} must be positive, got {amount}")));
    }
    Ok(())
}
