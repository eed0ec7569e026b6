//! Published reseller API.
//!
//! Two endpoints, both authenticated by `Authorization: Bearer <api key>`:
//!   POST /purchase  {bundle_id, phone_number}
//!   GET  /balance
//! Transport is left to the embedding server; these methods take the raw
//! header value and the decoded body.

use crate::{
    error::{AuthFailure, LedgerError, LedgerResult},
    ledger::LedgerEngine,
    session::SessionGate,
    types::{EntityId, Money},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiPurchaseRequest {
    pub bundle_id:    EntityId,
    pub phone_number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiPurchaseResponse {
    pub status:         String,
    pub transaction_id: EntityId,
    pub message:        String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiBalanceResponse {
    pub wallet_balance: Money,
    pub currency:       String,
}

pub struct ApiService<'a> {
    gate:     &'a SessionGate,
    engine:   &'a LedgerEngine,
    currency: &'a str,
}

impl<'a> ApiService<'a> {
    pub fn new(gate: &'a SessionGate, engine: &'a LedgerEngine, currency: &'a str) -> Self {
        Self { gate, engine, currency }
    }

    pub fn purchase(
        &self,
        authorization: &str,
        request: &ApiPurchaseRequest,
    ) -> LedgerResult<ApiPurchaseResponse> {
        let caller = self.gate.authenticate_api_key(bearer_token(authorization)?)?;
        let phone = request.phone_number.trim();
        if phone.is_empty() {
            return Err(LedgerError::validation("phone_number is required"));
        }
        let bundle = self.engine.bundle(&request.bundle_id)?;
        let tx = self.engine.purchase(&caller.id, &bundle.id, Some(phone))?;
        log::info!("api: purchase user={} bundle={} tx={}", caller.id, bundle.id, tx.id);
        Ok(ApiPurchaseResponse {
            status:         "success".to_string(),
            transaction_id: tx.id,
            message:        format!("{} Data sent to {phone}", bundle.data_amount),
        })
    }

    pub fn balance(&self, authorization: &str) -> LedgerResult<ApiBalanceResponse> {
        let caller = self.gate.authenticate_api_key(bearer_token(authorization)?)?;
        Ok(ApiBalanceResponse {
            wallet_balance: caller.wallet_balance,
            currency:       self.currency.to_string(),
        })
    }
}

/// Extract the key from an `Authorization` header value.
/// The scheme name is case-insensitive.
pub fn bearer_token(header: &str) -> LedgerResult<&str> {
    let header = header.trim();
    let (scheme, token) = header
        .split_once(char::is_whitespace)
        .ok_or(LedgerError::AuthenticationFailure(AuthFailure::InvalidApiKey))?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(LedgerError::AuthenticationFailure(AuthFailure::InvalidApiKey));
    }
    Ok(token)
}
