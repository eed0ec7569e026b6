//! Balance ledger and transaction engine for a data-bundle storefront.
//!
//! Start from `storefront::Storefront`, which wires the SQLite store,
//! the session gate and the ledger engine together.

pub mod api;
pub mod bulk;
pub mod clock;
pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod ledger;
pub mod pricing;
pub mod records;
pub mod rng;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod storefront;
pub mod types;

pub use error::{LedgerError, LedgerResult};
pub use storefront::Storefront;
