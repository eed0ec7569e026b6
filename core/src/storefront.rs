//! Storefront: the wired-up ledger.
//!
//! Owns the store, configuration, session gate and ledger engine, seeds
//! an empty store, and executes `LedgerCommand`s as the session user.
//! Caller-side policy the engine leaves open (the price
//! floor on shop settings, admin gating) is applied here.

use crate::{
    api::{ApiPurchaseRequest, ApiService},
    bulk::{self, BulkPreview, BulkReport},
    clock::LedgerClock,
    command::LedgerCommand,
    config::StorefrontConfig,
    error::{AuthFailure, LedgerError, LedgerResult},
    event::EventLogEntry,
    ledger::{LedgerEngine, ShopSale, ShopSettings},
    pricing,
    records::{PublicUser, Role, User},
    rng::TokenRng,
    session::{Registration, SessionGate},
    snapshot::{self, ImportSummary, StoreSnapshot},
    store::LedgerStore,
};
use chrono::{TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const TEST_SEED: u64 = 42;

pub struct Storefront {
    store:  Arc<LedgerStore>,
    clock:  Arc<LedgerClock>,
    config: StorefrontConfig,
    gate:   SessionGate,
    engine: LedgerEngine,
}

impl Storefront {
    /// Open and migrate a database without seeding it.
    pub fn open(db_path: &str, data_dir: &str) -> anyhow::Result<Self> {
        let config = StorefrontConfig::load(data_dir)?;
        let store = LedgerStore::open(db_path, config.settings.busy_timeout())?;
        let front = Self::assemble(store, config, LedgerClock::system(), TokenRng::from_entropy())?;
        Ok(front)
    }

    /// Open, migrate and seed an empty store with the catalog and accounts.
    pub fn build(db_path: &str, data_dir: &str) -> anyhow::Result<Self> {
        let front = Self::open(db_path, data_dir)?;
        front.seed()?;
        Ok(front)
    }

    /// In-memory, unseeded, with deterministic tokens and timestamps.
    pub fn open_test() -> LedgerResult<Self> {
        let config = StorefrontConfig::load(concat!(env!("CARGO_MANIFEST_DIR"), "/../data"))?;
        let start = Utc
            .with_ymd_and_hms(2025, 1, 1, 8, 0, 0)
            .single()
            .ok_or_else(|| LedgerError::validation("bad test clock start"))?;
        Self::assemble(
            LedgerStore::in_memory()?,
            config,
            LedgerClock::stepped(start, 1),
            TokenRng::seeded(TEST_SEED),
        )
    }

    /// In-memory and seeded. The storefront most tests start from.
    pub fn build_test() -> LedgerResult<Self> {
        let front = Self::open_test()?;
        front.seed()?;
        Ok(front)
    }

    fn assemble(
        store: LedgerStore,
        config: StorefrontConfig,
        clock: LedgerClock,
        rng: TokenRng,
    ) -> LedgerResult<Self> {
        let version = store.migrate()?;
        log::debug!("storefront: store at schema v{version}");
        let store = Arc::new(store);
        let clock = Arc::new(clock);
        let gate = SessionGate::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            rng,
            config.settings.api_key_prefix.clone(),
        );
        let engine = LedgerEngine::new(Arc::clone(&store), Arc::clone(&clock));
        Ok(Self { store, clock, config, gate, engine })
    }

    /// Insert the configured catalog and seed accounts into whichever of
    /// the two collections is still empty.
    pub fn seed(&self) -> LedgerResult<()> {
        self.store.atomically(|db| {
            if db.bundle_count()? == 0 {
                for bundle in &self.config.bundles {
                    db.insert_bundle(bundle)?;
                }
                log::info!("storefront: seeded {} bundles", self.config.bundles.len());
            }
            if db.user_count()? == 0 {
                for seed in &self.config.settings.seed_accounts {
                    db.insert_user(&User {
                        id:                 seed.id.clone(),
                        name:               seed.name.clone(),
                        username:           seed.username.clone(),
                        email:              seed.email.clone(),
                        phone_number:       seed.phone_number.clone(),
                        role:               seed.role,
                        password:           seed.password.clone(),
                        api_key:            None,
                        wallet_balance:     seed.wallet_balance,
                        profit_balance:     Default::default(),
                        console_balance:    Default::default(),
                        parent_id:          None,
                        shop_name:          None,
                        shop_slug:          Some(seed.username.clone()),
                        shop_support_phone: None,
                        shop_prices:        BTreeMap::new(),
                        agent_prices:       BTreeMap::new(),
                        created_at:         self.clock.now(),
                        version:            0,
                        extra:              BTreeMap::new(),
                    })?;
                }
                log::info!(
                    "storefront: seeded {} accounts",
                    self.config.settings.seed_accounts.len()
                );
            }
            Ok(())
        })
    }

    pub fn gate(&self) -> &SessionGate {
        &self.gate
    }

    pub fn engine(&self) -> &LedgerEngine {
        &self.engine
    }

    pub fn config(&self) -> &StorefrontConfig {
        &self.config
    }

    pub fn api(&self) -> ApiService<'_> {
        ApiService::new(&self.gate, &self.engine, &self.config.settings.currency)
    }

    // ── Policy-wrapped operations ─────────────────────────────────

    /// Shop settings with the price floor enforced: no public or agent
    /// price may undercut the base price.
    pub fn update_shop_settings(
        &self,
        user_id: &str,
        settings: ShopSettings,
    ) -> LedgerResult<PublicUser> {
        let bundles = self.engine.list_bundles()?;
        pricing::check_price_floor(&bundles, &settings.public_prices, "Public")?;
        if let Some(agent_prices) = &settings.agent_prices {
            pricing::check_price_floor(&bundles, agent_prices, "Agent")?;
        }
        self.engine.update_shop_settings(user_id, settings)
    }

    pub fn purchase_from_shop(
        &self,
        shop_slug: &str,
        bundle_id: &str,
        phone: &str,
    ) -> LedgerResult<ShopSale> {
        let owner = self.gate.shop_by_slug(shop_slug)?;
        self.engine.purchase_from_shop(&owner.id, bundle_id, phone)
    }

    pub fn preview_bulk(&self, text: &str) -> LedgerResult<BulkPreview> {
        let bundles = self.engine.list_bundles()?;
        Ok(bulk::parse_bulk_orders(text, &self.config.networks, &bundles))
    }

    pub fn process_bulk(&self, user_id: &str, text: &str) -> LedgerResult<BulkReport> {
        let preview = self.preview_bulk(text)?;
        Ok(bulk::process_bulk(&self.engine, user_id, &preview.orders))
    }

    pub fn export_snapshot(&self) -> LedgerResult<StoreSnapshot> {
        snapshot::export_snapshot(&self.store, &self.clock)
    }

    pub fn import_snapshot(&self, json: &str) -> LedgerResult<ImportSummary> {
        snapshot::import_snapshot(&self.store, &self.clock, json)
    }

    pub fn recent_events(&self, limit: usize) -> LedgerResult<Vec<EventLogEntry>> {
        self.store.read(|db| db.recent_events(limit))
    }

    pub fn events_of_type(&self, event_type: &str) -> LedgerResult<Vec<EventLogEntry>> {
        self.store.read(|db| db.events_of_type(event_type))
    }

    // ── Command dispatch ──────────────────────────────────────────

    /// Run `cmd` as the session user and return its result as JSON.
    pub fn execute(&self, cmd: LedgerCommand) -> LedgerResult<Value> {
        let actor = if cmd.requires_session() {
            Some(self.gate.require_session()?)
        } else {
            None
        };
        if cmd.requires_admin() && !actor.as_ref().is_some_and(|u| u.role == Role::Admin) {
            log::warn!("storefront: {} refused for non-admin", cmd.name());
            return Err(LedgerError::AuthenticationFailure(AuthFailure::Forbidden));
        }
        log::debug!("storefront: execute {}", cmd.name());
        let me = actor.as_ref().map(|u| u.id.as_str()).unwrap_or_default();

        match cmd {
            LedgerCommand::Login { email, password } => json(self.gate.login(&email, &password)?),
            LedgerCommand::Register { name, email, password, username, phone_number, parent_id } => {
                json(self.gate.register(Registration {
                    name,
                    email,
                    password,
                    username,
                    phone_number,
                    parent_id,
                })?)
            }
            LedgerCommand::Logout => json(self.gate.logout()?),
            LedgerCommand::GetSession => json(self.gate.get_session()?),
            LedgerCommand::ChangePassword { old_password, new_password } => {
                json(self.gate.change_password(me, &old_password, &new_password)?)
            }
            LedgerCommand::GenerateApiKey => json(self.gate.generate_api_key(me)?),
            LedgerCommand::MyAgents => json(self.gate.agents_of(me)?),

            LedgerCommand::Purchase { bundle_id, phone } => {
                json(self.engine.purchase(me, &bundle_id, phone.as_deref())?)
            }
            LedgerCommand::TopUp { amount } => json(self.engine.top_up(me, amount)?),
            LedgerCommand::CashoutProfit => json(self.engine.cashout_profit(me)?),
            LedgerCommand::Transactions => json(self.engine.transactions_for(me)?),
            LedgerCommand::PreviewBulk { text } => json(self.preview_bulk(&text)?),
            LedgerCommand::ProcessBulk { text } => json(self.process_bulk(me, &text)?),

            LedgerCommand::TransferConsoleData { amount_gb, phone } => {
                json(self.engine.transfer_console_data(me, amount_gb, &phone)?)
            }

            LedgerCommand::UpdateShopSettings { shop_name, public_prices, agent_prices, support_phone } => {
                json(self.update_shop_settings(
                    me,
                    ShopSettings { shop_name, public_prices, agent_prices, support_phone },
                )?)
            }
            LedgerCommand::ShopBySlug { slug } => json(self.gate.shop_by_slug(&slug)?),
            LedgerCommand::PurchaseFromShop { shop_slug, bundle_id, phone } => {
                json(self.purchase_from_shop(&shop_slug, &bundle_id, &phone)?)
            }

            LedgerCommand::ListBundles => json(self.engine.list_bundles()?),

            LedgerCommand::ApiPurchase { authorization, bundle_id, phone_number } => json(
                self.api()
                    .purchase(&authorization, &ApiPurchaseRequest { bundle_id, phone_number })?,
            ),
            LedgerCommand::ApiBalance { authorization } => json(self.api().balance(&authorization)?),

            LedgerCommand::ListUsers => json(self.gate.list_users()?),
            LedgerCommand::AdminAdjustBalance { user_id, amount, direction } => {
                json(self.engine.admin_adjust_balance(&user_id, amount, direction)?)
            }
            LedgerCommand::AddBundle { bundle } => json(self.engine.add_bundle(bundle)?),
            LedgerCommand::DeleteBundle { bundle_id } => json(self.engine.delete_bundle(&bundle_id)?),
            LedgerCommand::ExportSnapshot => json(self.export_snapshot()?),
        }
    }
}

fn json<T: Serialize>(value: T) -> LedgerResult<Value> {
    Ok(serde_json::to_value(value)?)
}
