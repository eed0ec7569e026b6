//! Typed records held by the store: users, bundles, transactions, session.
//!
//! RULE: `User` carries the password and never leaves the crate
//! boundary directly. Callers always receive a `PublicUser`.

use crate::{
    error::{LedgerError, LedgerResult},
    types::{EntityId, Gigabytes, Money, PriceMap},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

// ── Enums ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User  => "USER",
            Self::Admin => "ADMIN",
        }
    }
}

impl FromStr for Role {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER"  => Ok(Self::User),
            "ADMIN" => Ok(Self::Admin),
            other   => Err(LedgerError::validation(format!("unknown role: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    #[serde(rename = "MTN")]
    Mtn,
    Telecel,
    AirtelTigo,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mtn        => "MTN",
            Self::Telecel    => "Telecel",
            Self::AirtelTigo => "AirtelTigo",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MTN"        => Ok(Self::Mtn),
            "Telecel"    => Ok(Self::Telecel),
            "AirtelTigo" => Ok(Self::AirtelTigo),
            other        => Err(LedgerError::validation(format!("unknown provider: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BundleCategory {
    #[default]
    Standard,
    Console,
}

impl BundleCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Console  => "console",
        }
    }
}

impl FromStr for BundleCategory {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(Self::Standard),
            "console"  => Ok(Self::Console),
            other      => Err(LedgerError::validation(format!("unknown bundle category: {other}"))),
        }
    }
}

/// Closed set of transaction types.
/// `amount` is currency for every kind except `ConsoleTransfer` (GB).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Deposit,
    Purchase,
    BulkPurchase,
    ProfitCashout,
    AdminCredit,
    AdminDebit,
    ConsoleTopup,
    ConsoleTransfer,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit         => "DEPOSIT",
            Self::Purchase        => "PURCHASE",
            Self::BulkPurchase    => "BULK_PURCHASE",
            Self::ProfitCashout   => "PROFIT_CASHOUT",
            Self::AdminCredit     => "ADMIN_CREDIT",
            Self::AdminDebit      => "ADMIN_DEBIT",
            Self::ConsoleTopup    => "CONSOLE_TOPUP",
            Self::ConsoleTransfer => "CONSOLE_TRANSFER",
        }
    }

    /// True when `amount` holds gigabytes rather than currency.
    pub fn amount_is_data(&self) -> bool {
        matches!(self, Self::ConsoleTransfer)
    }
}

impl FromStr for TransactionKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEPOSIT"          => Ok(Self::Deposit),
            "PURCHASE"         => Ok(Self::Purchase),
            "BULK_PURCHASE"    => Ok(Self::BulkPurchase),
            "PROFIT_CASHOUT"   => Ok(Self::ProfitCashout),
            "ADMIN_CREDIT"     => Ok(Self::AdminCredit),
            "ADMIN_DEBIT"      => Ok(Self::AdminDebit),
            "CONSOLE_TOPUP"    => Ok(Self::ConsoleTopup),
            "CONSOLE_TRANSFER" => Ok(Self::ConsoleTransfer),
            other => Err(LedgerError::validation(format!("unknown transaction type: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxStatus {
    Pending,
    #[default]
    Completed,
    Failed,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending   => "PENDING",
            Self::Completed => "COMPLETED",
            Self::Failed    => "FAILED",
        }
    }
}

impl FromStr for TxStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING"   => Ok(Self::Pending),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED"    => Ok(Self::Failed),
            other       => Err(LedgerError::validation(format!("unknown status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdjustDirection {
    Credit,
    Debit,
}

// ── User ──────────────────────────────────────────────────────────

/// A stored user, secret included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id:                 EntityId,
    pub name:               String,
    pub username:           String,
    pub email:              String,
    pub phone_number:       String,
    pub role:               Role,
    pub password:           String,
    pub api_key:            Option<String>,
    pub wallet_balance:     Money,
    pub profit_balance:     Money,
    pub console_balance:    Gigabytes,
    pub parent_id:          Option<EntityId>,
    pub shop_name:          Option<String>,
    pub shop_slug:          Option<String>,
    pub shop_support_phone: Option<String>,
    #[serde(default)]
    pub shop_prices:        PriceMap,
    #[serde(default)]
    pub agent_prices:       PriceMap,
    pub created_at:         DateTime<Utc>,
    /// Write stamp; bumped by every save.
    #[serde(default)]
    pub version:            i64,
    /// Fields carried over from imported records that the schema does not model.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra:              BTreeMap<String, serde_json::Value>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id:                 self.id.clone(),
            name:               self.name.clone(),
            username:           self.username.clone(),
            email:              self.email.clone(),
            phone_number:       self.phone_number.clone(),
            role:               self.role,
            api_key:            self.api_key.clone(),
            wallet_balance:     self.wallet_balance,
            profit_balance:     self.profit_balance,
            console_balance:    self.console_balance,
            parent_id:          self.parent_id.clone(),
            shop_name:          self.shop_name.clone(),
            shop_slug:          self.shop_slug.clone(),
            shop_support_phone: self.shop_support_phone.clone(),
            shop_prices:        self.shop_prices.clone(),
            agent_prices:       self.agent_prices.clone(),
            created_at:         self.created_at,
        }
    }
}

/// A user as returned to callers: no password.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id:                 EntityId,
    pub name:               String,
    pub username:           String,
    pub email:              String,
    pub phone_number:       String,
    pub role:               Role,
    pub api_key:            Option<String>,
    pub wallet_balance:     Money,
    pub profit_balance:     Money,
    pub console_balance:    Gigabytes,
    pub parent_id:          Option<EntityId>,
    pub shop_name:          Option<String>,
    pub shop_slug:          Option<String>,
    pub shop_support_phone: Option<String>,
    pub shop_prices:        PriceMap,
    pub agent_prices:       PriceMap,
    pub created_at:         DateTime<Utc>,
}

// ── Bundle ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    pub id:          EntityId,
    pub provider:    Provider,
    pub name:        String,
    /// Base price: what the platform itself charges.
    pub price:       Money,
    pub data_amount: String,
    pub validity:    String,
    pub description: String,
    #[serde(default)]
    pub category:    BundleCategory,
}

impl Bundle {
    pub fn is_console(&self) -> bool {
        self.category == BundleCategory::Console
    }

    /// Numeric GB value of `data_amount`.
    pub fn data_gb(&self) -> LedgerResult<Gigabytes> {
        parse_data_amount(&self.data_amount)
    }
}

/// Parse a quantity such as `"5GB"` into gigabytes.
/// Everything except digits and `.` is stripped; the unit is ignored.
pub fn parse_data_amount(raw: &str) -> LedgerResult<Gigabytes> {
    let digits: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if digits.is_empty() {
        return Err(LedgerError::validation(format!("data amount has no number: {raw:?}")));
    }
    Decimal::from_str(&digits)
        .map_err(|e| LedgerError::validation(format!("bad data amount {raw:?}: {e}")))
}

// ── Transaction ───────────────────────────────────────────────────

/// An append-only ledger record. Never mutated after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id:          EntityId,
    pub user_id:     EntityId,
    pub kind:        TransactionKind,
    pub amount:      Decimal,
    pub created_at:  DateTime<Utc>,
    pub description: String,
    pub status:      TxStatus,
    pub bundle_id:   Option<EntityId>,
}

// ── Session ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token:      String,
    pub user_id:    EntityId,
    pub created_at: DateTime<Utc>,
}
