//! Ledgerly is the wallet ledger and derived-balance subsystem for a personal
//! finance app.
//!
//! It keeps a wallet's displayed balance consistent with an append-only
//! transaction log, propagates row-level changes to every live view observing
//! a user's data, and re-buckets the log into money-in/money-out series for
//! charting.
//!
//! The library is organised around four pieces:
//! - [apply_ledger_event]: the two-step write protocol (insert transaction,
//!   then adjust the materialized balance) with a compensating rollback when
//!   the second step fails.
//! - [display_balance]: the materialized-balance read with a safe-zero
//!   fallback.
//! - [ChangeFeed]: debounced change propagation from the store's notification
//!   channel to registered consumers.
//! - [flow_series]: the seeded week/month/year bucketing of the transaction
//!   log.
//!
//! [LedgerService] bundles the four behind the interface display views
//! consume.

#![warn(missing_docs)]

mod balance;
mod change_feed;
mod database_id;
mod db;
mod flow;
mod ledger;
mod service;
mod store;
#[cfg(test)]
mod test_utils;
mod transaction;
mod wallet;

pub use balance::{DisplayBalance, display_balance};
pub use change_feed::{ChangeFeed, DEFAULT_DEBOUNCE, Refresh, next_refresh};
pub use database_id::{DatabaseId, TransactionId, UserId, WalletId};
pub use db::initialize;
pub use flow::{FlowBucket, Granularity, flow_series};
pub use ledger::{LedgerEvent, LedgerReceipt, apply_ledger_event};
pub use service::LedgerService;
pub use store::{
    ChangeEvent, ChangeKind, ChangeSubscription, LedgerStore, TableKind, sqlite::SqliteLedgerStore,
};
pub use transaction::{Transaction, TransactionBuilder, TransactionKind};
pub use wallet::{DEFAULT_CURRENCY, Wallet};

/// The errors that may occur in the ledger subsystem.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A ledger event carried an amount that was not a finite number greater
    /// than zero.
    ///
    /// Rejected before any store call, so no side effects have occurred.
    #[error("transaction amounts must be finite and greater than zero, got {0}")]
    InvalidAmount(f64),

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// A store call did not complete within the per-call deadline.
    ///
    /// Callers should treat this the same as any other store failure; the
    /// call may or may not have taken effect on the remote side.
    #[error("the store call timed out")]
    Timeout,

    /// Could not acquire the database lock.
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// A background task running a store call failed to complete.
    #[error("a background store task failed: {0}")]
    TaskFailed(String),

    /// The balance update failed after the transaction insert succeeded, and
    /// the compensating delete also failed.
    ///
    /// The log now overstates history relative to the stale balance. This is
    /// never auto-corrected by read paths; it requires a manual
    /// reconciliation (full resummation) against the transaction log.
    #[error("wallet balance is stale and transaction {0} could not be rolled back")]
    ReconciliationDefect(TransactionId),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}
