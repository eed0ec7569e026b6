use crate::{
    records::{Bundle, Provider, Role},
    types::{EntityId, Money},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
struct BundleCatalogFile {
    bundles: Vec<Bundle>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkPrefixes {
    pub provider: Provider,
    pub prefixes: Vec<String>,
}

/// Static phone-prefix -> provider table used to route bulk orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkPrefixTable {
    pub networks:         Vec<NetworkPrefixes>,
    pub min_phone_length: usize,
}

impl NetworkPrefixTable {
    /// Leading-zero form of a phone number (`244...` -> `0244...`).
    pub fn normalize_phone(raw: &str) -> String {
        let trimmed = raw.trim();
        if trimmed.starts_with('0') {
            trimmed.to_string()
        } else {
            format!("0{trimmed}")
        }
    }

    /// Carrier for a phone number, from its three-character prefix.
    pub fn provider_for(&self, phone: &str) -> Option<Provider> {
        let normalized = Self::normalize_phone(phone);
        let prefix: String = normalized.chars().take(3).collect();
        self.networks
            .iter()
            .find(|n| n.prefixes.iter().any(|p| *p == prefix))
            .map(|n| n.provider)
    }
}

/// An account created on first start when the store has no users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedAccount {
    pub id:             EntityId,
    pub name:           String,
    pub username:       String,
    pub email:          String,
    pub phone_number:   String,
    pub password:       String,
    pub role:           Role,
    pub wallet_balance: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSettings {
    pub currency:        String,
    pub api_key_prefix:  String,
    pub busy_timeout_ms: u64,
    #[serde(default)]
    pub seed_accounts:   Vec<SeedAccount>,
}

impl LedgerSettings {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Catalog seeded into an empty store.
    pub bundles:  Vec<Bundle>,
    pub networks: NetworkPrefixTable,
    pub settings: LedgerSettings,
}

impl StorefrontConfig {
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let catalog_path = format!("{data_dir}/catalog/bundles.json");
        let catalog_content = std::fs::read_to_string(&catalog_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {catalog_path}: {e}"))?;
        let catalog: BundleCatalogFile = serde_json::from_str(&catalog_content)?;

        let prefix_path = format!("{data_dir}/network/prefixes.json");
        let prefix_content = std::fs::read_to_string(&prefix_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {prefix_path}: {e}"))?;
        let networks: NetworkPrefixTable = serde_json::from_str(&prefix_content)?;

        let settings_path = format!("{data_dir}/ledger/settings.json");
        let settings_content = std::fs::read_to_string(&settings_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {settings_path}: {e}"))?;
        let settings: LedgerSettings = serde_json::from_str(&settings_content)?;

        let mut seen = std::collections::HashSet::new();
        if let Some(dup) = catalog.bundles.iter().find(|b| !seen.insert(b.id.as_str())) {
            anyhow::bail!("{catalog_path}: duplicate bundle id {}", dup.id);
        }

        log::debug!(
            "config: {} bundles, {} networks, {} seed accounts from {data_dir}",
            catalog.bundles.len(),
            networks.networks.len(),
            settings.seed_accounts.len()
        );

        Ok(Self {
            bundles: catalog.bundles,
            networks,
            settings,
        })
    }
}
