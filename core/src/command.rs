use crate::{
    ledger::ShopSettings,
    records::{AdjustDirection, Bundle},
    session::Registration,
    types::{EntityId, Gigabytes, Money, PriceMap},
};
use serde::{Deserialize, Serialize};

/// Every operation a storefront caller can issue.
/// Variants are only ever appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum LedgerCommand {
    // ── Identity ──────────────────────────────────
    Login {
        email:    String,
        password: String,
    },
    Register {
        name:         String,
        email:        String,
        password:     String,
        username:     String,
        phone_number: String,
        #[serde(default)]
        parent_id:    Option<EntityId>,
    },
    Logout,
    GetSession,
    ChangePassword {
        old_password: String,
        new_password: String,
    },
    GenerateApiKey,
    MyAgents,

    // ── Wallet & purchases ────────────────────────
    Purchase {
        bundle_id: EntityId,
        #[serde(default)]
        phone:     Option<String>,
    },
    TopUp {
        amount: Money,
    },
    CashoutProfit,
    Transactions,
    PreviewBulk {
        text: String,
    },
    ProcessBulk {
        text: String,
    },

    // ── Console ───────────────────────────────────
    TransferConsoleData {
        amount_gb: Gigabytes,
        phone:     String,
    },

    // ── Shops ─────────────────────────────────────
    UpdateShopSettings {
        shop_name:     String,
        #[serde(default)]
        public_prices: PriceMap,
        #[serde(default)]
        agent_prices:  Option<PriceMap>,
        #[serde(default)]
        support_phone: Option<String>,
    },
    ShopBySlug {
        slug: String,
    },
    PurchaseFromShop {
        shop_slug: String,
        bundle_id: EntityId,
        phone:     String,
    },

    // ── Catalog ───────────────────────────────────
    ListBundles,

    // ── Published API ─────────────────────────────
    ApiPurchase {
        authorization: String,
        bundle_id:     EntityId,
        phone_number:  String,
    },
    ApiBalance {
        authorization: String,
    },

    // ── Administration ────────────────────────────
    ListUsers,
    AdminAdjustBalance {
        user_id:   EntityId,
        amount:    Money,
        direction: AdjustDirection,
    },
    AddBundle {
        bundle: Bundle,
    },
    DeleteBundle {
        bundle_id: EntityId,
    },
    ExportSnapshot,
}

impl LedgerCommand {
    /// Commands that act as the logged-in user.
    pub fn requires_session(&self) -> bool {
        !matches!(
            self,
            Self::Login { .. }
                | Self::Register { .. }
                | Self::Logout
                | Self::GetSession
                | Self::ShopBySlug { .. }
                | Self::PurchaseFromShop { .. }
                | Self::ListBundles
                | Self::ApiPurchase { .. }
                | Self::ApiBalance { .. }
        )
    }

    pub fn requires_admin(&self) -> bool {
        matches!(
            self,
            Self::ListUsers
                | Self::AdminAdjustBalance { .. }
                | Self::AddBundle { .. }
                | Self::DeleteBundle { .. }
                | Self::ExportSnapshot
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Login { .. }               => "login",
            Self::Register { .. }            => "register",
            Self::Logout                     => "logout",
            Self::GetSession                 => "get_session",
            Self::ChangePassword { .. }      => "change_password",
            Self::GenerateApiKey             => "generate_api_key",
            Self::MyAgents                   => "my_agents",
            Self::Purchase { .. }            => "purchase",
            Self::TopUp { .. }               => "top_up",
            Self::CashoutProfit              => "cashout_profit",
            Self::Transactions               => "transactions",
            Self::PreviewBulk { .. }         => "preview_bulk",
            Self::ProcessBulk { .. }         => "process_bulk",
            Self::TransferConsoleData { .. } => "transfer_console_data",
            Self::UpdateShopSettings { .. }  => "update_shop_settings",
            Self::ShopBySlug { .. }          => "shop_by_slug",
            Self::PurchaseFromShop { .. }    => "purchase_from_shop",
            Self::ListBundles                => "list_bundles",
            Self::ApiPurchase { .. }         => "api_purchase",
            Self::ApiBalance { .. }          => "api_balance",
            Self::ListUsers                  => "list_users",
            Self::AdminAdjustBalance { .. }  => "admin_adjust_balance",
            Self::AddBundle { .. }           => "add_bundle",
            Self::DeleteBundle { .. }        => "delete_bundle",
            Self::ExportSnapshot             => "export_snapshot",
        }
    }
}

impl From<Registration> for LedgerCommand {
    fn from(form: Registration) -> Self {
        Self::Register {
            name:         form.name,
            email:        form.email,
            password:     form.password,
            username:     form.username,
            phone_number: form.phone_number,
            parent_id:    form.parent_id,
        }
    }
}

impl From<ShopSettings> for LedgerCommand {
    fn from(s: ShopSettings) -> Self {
        Self::UpdateShopSettings {
            shop_name:     s.shop_name,
            public_prices: s.public_prices,
            agent_prices:  s.agent_prices,
            support_phone: s.support_phone,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse_from_tagged_json() {
        let cmd: LedgerCommand =
            serde_json::from_str(r#"{"cmd":"top_up","amount":"25.50"}"#).unwrap();
        assert!(matches!(cmd, LedgerCommand::TopUp { .. }));
        assert!(cmd.requires_session());
        assert!(!cmd.requires_admin());

        let cmd: LedgerCommand = serde_json::from_str(
            r#"{"cmd":"admin_adjust_balance","user_id":"u1","amount":"5","direction":"DEBIT"}"#,
        )
        .unwrap();
        assert!(cmd.requires_admin());
        assert_eq!(cmd.name(), "admin_adjust_balance");
    }
}
