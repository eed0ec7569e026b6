//! Audit events that are not balance movements.
//!
//! Balance movements are recorded as `Transaction`s. Everything else
//! worth auditing (registrations, catalog edits, public shop sales,
//! credential rotation, imports) lands in the event log, written in the
//! same SQL transaction as the change it describes.

use crate::types::{EntityId, Money};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Variants are only ever appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    // ── Identity ───────────────────────────────────
    UserRegistered {
        user_id:   EntityId,
        username:  String,
        parent_id: Option<EntityId>,
    },
    ParentReferenceDropped {
        user_id:   EntityId,
        parent_id: EntityId,
    },
    PasswordChanged {
        user_id: EntityId,
    },
    ApiKeyRotated {
        user_id: EntityId,
    },

    // ── Catalog ────────────────────────────────────
    BundleAdded {
        bundle_id: EntityId,
        price:     Money,
    },
    BundleDeleted {
        bundle_id: EntityId,
    },

    // ── Shops ──────────────────────────────────────
    ShopSettingsUpdated {
        user_id:      EntityId,
        public_count: usize,
        agent_count:  usize,
    },
    ShopSaleRecorded {
        owner_id:       EntityId,
        bundle_id:      EntityId,
        phone_number:   String,
        customer_price: Money,
        base_price:     Money,
        profit:         Money,
        below_base:     bool,
    },

    // ── Maintenance ────────────────────────────────
    SnapshotImported {
        schema_version: u32,
        users:          usize,
        transactions:   usize,
    },
}

impl LedgerEvent {
    /// Stable name for the `event_type` column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::UserRegistered { .. }         => "user_registered",
            Self::ParentReferenceDropped { .. } => "parent_reference_dropped",
            Self::PasswordChanged { .. }        => "password_changed",
            Self::ApiKeyRotated { .. }          => "api_key_rotated",
            Self::BundleAdded { .. }            => "bundle_added",
            Self::BundleDeleted { .. }          => "bundle_deleted",
            Self::ShopSettingsUpdated { .. }    => "shop_settings_updated",
            Self::ShopSaleRecorded { .. }       => "shop_sale_recorded",
            Self::SnapshotImported { .. }       => "snapshot_imported",
        }
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id:         Option<i64>,
    pub created_at: DateTime<Utc>,
    pub event_type: String,
    pub payload:    String, // JSON-serialized LedgerEvent
}

impl EventLogEntry {
    pub fn decode(&self) -> serde_json::Result<LedgerEvent> {
        serde_json::from_str(&self.payload)
    }
}
