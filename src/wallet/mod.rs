//! Wallet management for the ledger subsystem.
//!
//! A wallet carries the materialized balance for a user's transaction log.
//! The balance field is mutated only by the ledger write protocol
//! ([crate::apply_ledger_event]); everything else reads it.

mod core;

pub use core::{
    DEFAULT_CURRENCY, Wallet, create_wallet, create_wallet_table, get_latest_wallet, get_wallet,
    get_wallets_by_user, map_wallet_row, update_wallet_balance,
};
