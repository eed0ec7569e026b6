//! Session and identity gate.
//!
//! Decides which user a caller may act as. Credentials are compared by
//! plain equality; there is no hashing layer. At most one session exists
//! at a time and it stores only a user id, so every `get_session` re-reads
//! the user and observes the latest balances.

use crate::{
    clock::LedgerClock,
    error::{AuthFailure, LedgerError, LedgerResult},
    event::LedgerEvent,
    records::{PublicUser, Role, Session, User},
    rng::TokenRng,
    store::LedgerStore,
    types::EntityId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

/// Fields collected by the sign-up form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registration {
    pub name:         String,
    pub email:        String,
    pub password:     String,
    pub username:     String,
    pub phone_number: String,
    /// Shop owner the new user signs up under, if any.
    #[serde(default)]
    pub parent_id:    Option<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginOutcome {
    pub user:  PublicUser,
    pub token: String,
}

pub struct SessionGate {
    store:          Arc<LedgerStore>,
    clock:          Arc<LedgerClock>,
    rng:            Mutex<TokenRng>,
    api_key_prefix: String,
}

impl SessionGate {
    pub fn new(
        store: Arc<LedgerStore>,
        clock: Arc<LedgerClock>,
        rng: TokenRng,
        api_key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            clock,
            rng: Mutex::new(rng),
            api_key_prefix: api_key_prefix.into(),
        }
    }

    /// Case-insensitive email, exact password. Replaces any active session.
    pub fn login(&self, email: &str, password: &str) -> LedgerResult<LoginOutcome> {
        let token = self.next_token();
        self.store.atomically(|db| {
            let user = match db.find_user_by_email(email.trim())? {
                Some(u) if u.password == password => u,
                _ => {
                    log::warn!("session: failed login for {email}");
                    return Err(LedgerError::AuthenticationFailure(AuthFailure::InvalidCredentials));
                }
            };
            db.put_session(&Session {
                token:      token.clone(),
                user_id:    user.id.clone(),
                created_at: self.clock.now(),
            })?;
            log::info!("session: login user={}", user.id);
            Ok(LoginOutcome { user: user.to_public(), token })
        })
    }

    /// Create a USER account with zero balances.
    ///
    /// A parent id that does not resolve is dropped without error. A parent
    /// that is itself an agent is dropped as well, keeping owner chains one
    /// level deep. Users without a parent get a shop slug equal to their
    /// username.
    pub fn register(&self, form: Registration) -> LedgerResult<PublicUser> {
        let email = form.email.trim().to_string();
        let username = form.username.trim().to_string();
        if email.is_empty() || username.is_empty() || form.password.is_empty() {
            return Err(LedgerError::validation("email, username and password are required"));
        }

        self.store.atomically(|db| {
            if db.find_user_by_email(&email)?.is_some() {
                return Err(LedgerError::DuplicateIdentity { field: "email", value: email.clone() });
            }
            if db.username_taken(&username)? {
                return Err(LedgerError::DuplicateIdentity {
                    field: "username",
                    value: username.clone(),
                });
            }

            let id = new_user_id();
            let parent_id = match form.parent_id.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
                None => None,
                Some(pid) => match db.find_user(pid)? {
                    None => {
                        log::debug!("session: parent {pid} not found, registering {username} unparented");
                        None
                    }
                    Some(parent) if parent.parent_id.is_some() => {
                        log::warn!("session: parent {pid} is itself an agent, dropping reference");
                        db.append_event(
                            self.clock.now(),
                            &LedgerEvent::ParentReferenceDropped {
                                user_id:   id.clone(),
                                parent_id: pid.to_string(),
                            },
                        )?;
                        None
                    }
                    Some(parent) => Some(parent.id),
                },
            };

            let user = User {
                id:                 id.clone(),
                name:               form.name.trim().to_string(),
                username:           username.clone(),
                email:              email.clone(),
                phone_number:       form.phone_number.trim().to_string(),
                role:               Role::User,
                password:           form.password.clone(),
                api_key:            None,
                wallet_balance:     Decimal::ZERO,
                profit_balance:     Decimal::ZERO,
                console_balance:    Decimal::ZERO,
                shop_slug:          parent_id.is_none().then(|| username.clone()),
                parent_id,
                shop_name:          None,
                shop_support_phone: None,
                shop_prices:        BTreeMap::new(),
                agent_prices:       BTreeMap::new(),
                created_at:         self.clock.now(),
                version:            0,
                extra:              BTreeMap::new(),
            };
            db.insert_user(&user)?;
            db.append_event(
                self.clock.now(),
                &LedgerEvent::UserRegistered {
                    user_id:   user.id.clone(),
                    username:  user.username.clone(),
                    parent_id: user.parent_id.clone(),
                },
            )?;
            log::info!("session: registered user={} parent={:?}", user.id, user.parent_id);
            Ok(user.to_public())
        })
    }

    pub fn logout(&self) -> LedgerResult<()> {
        self.store.atomically(|db| db.clear_session())
    }

    /// The session user, re-read from the store. A session pointing at a
    /// missing user reads as no session.
    pub fn get_session(&self) -> LedgerResult<Option<PublicUser>> {
        self.store.read(|db| match db.current_session()? {
            Some(s) => Ok(db.find_user(&s.user_id)?.map(|u| u.to_public())),
            None => Ok(None),
        })
    }

    /// Like `get_session`, but an error when nobody is logged in.
    pub fn require_session(&self) -> LedgerResult<PublicUser> {
        self.get_session()?
            .ok_or(LedgerError::AuthenticationFailure(AuthFailure::NoSession))
    }

    pub fn change_password(&self, user_id: &str, old: &str, new: &str) -> LedgerResult<()> {
        if new.is_empty() {
            return Err(LedgerError::validation("new password cannot be empty"));
        }
        self.store.atomically(|db| {
            let mut user = db.require_user(user_id)?;
            if user.password != old {
                return Err(LedgerError::AuthenticationFailure(AuthFailure::IncorrectOldPassword));
            }
            user.password = new.to_string();
            db.save_user(&user)?;
            db.append_event(
                self.clock.now(),
                &LedgerEvent::PasswordChanged { user_id: user_id.to_string() },
            )?;
            log::info!("session: password changed user={user_id}");
            Ok(())
        })
    }

    /// Issue a fresh API key, replacing the previous one.
    pub fn generate_api_key(&self, user_id: &str) -> LedgerResult<String> {
        let key = self.next_api_key();
        self.store.atomically(|db| {
            let mut user = db.require_user(user_id)?;
            user.api_key = Some(key.clone());
            db.save_user(&user)?;
            db.append_event(
                self.clock.now(),
                &LedgerEvent::ApiKeyRotated { user_id: user_id.to_string() },
            )?;
            log::info!("session: api key rotated user={user_id}");
            Ok(key)
        })
    }

    pub fn authenticate_api_key(&self, key: &str) -> LedgerResult<PublicUser> {
        let key = key.trim();
        if key.is_empty() {
            return Err(LedgerError::AuthenticationFailure(AuthFailure::InvalidApiKey));
        }
        self.store.read(|db| {
            db.find_user_by_api_key(key)?
                .map(|u| u.to_public())
                .ok_or(LedgerError::AuthenticationFailure(AuthFailure::InvalidApiKey))
        })
    }

    pub fn list_users(&self) -> LedgerResult<Vec<PublicUser>> {
        self.store
            .read(|db| Ok(db.all_users()?.iter().map(User::to_public).collect()))
    }

    /// The shop owner `user_id` is an agent of, if that owner still exists.
    pub fn agent_parent(&self, user_id: &str) -> LedgerResult<Option<PublicUser>> {
        self.store.read(|db| {
            let user = db.require_user(user_id)?;
            match user.parent_id {
                Some(pid) => Ok(db.find_user(&pid)?.map(|p| p.to_public())),
                None => Ok(None),
            }
        })
    }

    /// Agents registered under `owner_id`.
    pub fn agents_of(&self, owner_id: &str) -> LedgerResult<Vec<PublicUser>> {
        self.store
            .read(|db| Ok(db.agents_of(owner_id)?.iter().map(User::to_public).collect()))
    }

    /// Resolve a public shop by slug.
    pub fn shop_by_slug(&self, slug: &str) -> LedgerResult<PublicUser> {
        self.store.read(|db| {
            db.find_user_by_shop_slug(slug.trim())?
                .map(|u| u.to_public())
                .ok_or_else(|| LedgerError::not_found("shop", slug))
        })
    }

    fn next_token(&self) -> String {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).session_token()
    }

    fn next_api_key(&self) -> String {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .api_key(&self.api_key_prefix)
    }
}

pub fn new_user_id() -> EntityId {
    format!("u_{}", Uuid::now_v7().simple())
}
