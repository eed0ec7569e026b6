use rust_decimal::Decimal;
use thiserror::Error;

/// Which balance an operation found too low.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceKind {
    Wallet,
    Profit,
    Console,
}

impl std::fmt::Display for BalanceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Wallet  => write!(f, "wallet"),
            Self::Profit  => write!(f, "profit"),
            Self::Console => write!(f, "console"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    InvalidCredentials,
    IncorrectOldPassword,
    InvalidApiKey,
    NoSession,
    Forbidden,
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::InvalidCredentials   => "invalid credentials",
            Self::IncorrectOldPassword => "incorrect old password",
            Self::InvalidApiKey        => "invalid API key",
            Self::NoSession            => "no active session",
            Self::Forbidden            => "operation requires an administrator",
        };
        f.write_str(text)
    }
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Insufficient {kind} balance: available {available}, required {required}")]
    InsufficientBalance {
        kind:      BalanceKind,
        available: Decimal,
        required:  Decimal,
    },

    #[error("{field} '{value}' is already taken")]
    DuplicateIdentity { field: &'static str, value: String },

    #[error("Authentication failed: {0}")]
    AuthenticationFailure(AuthFailure),

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("User '{user_id}' was modified concurrently")]
    Conflict { user_id: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LedgerError {
    pub fn not_found(entity: &'static str, id: &str) -> Self {
        Self::NotFound { entity, id: id.to_string() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
