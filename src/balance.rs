//! The balance materializer.
//!
//! Supplies the total balance a user sees across all of their wallets. The
//! figure is the sum of the materialized `balance` fields kept in lockstep
//! with the log by [crate::apply_ledger_event]. It is never re-derived by
//! summing the transaction log, which would be correct but too costly on
//! every read.

use serde::Serialize;

use crate::{database_id::UserId, store::LedgerStore, wallet::DEFAULT_CURRENCY};

/// The total balance displayed to a user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayBalance {
    /// The summed balance across the user's wallets.
    pub amount: f64,
    /// The currency the amount is denominated in.
    pub currency: String,
}

impl DisplayBalance {
    /// A zero balance in the default currency, used as the safe fallback when
    /// wallets cannot be read.
    pub fn zero() -> Self {
        Self {
            amount: 0.0,
            currency: DEFAULT_CURRENCY.to_owned(),
        }
    }
}

/// Get the total balance across all of `user_id`'s wallets.
///
/// On any error reading the wallets, a zero balance is returned rather than a
/// stale or undefined figure; the error is logged here so display layers can
/// treat the result uniformly. The read is idempotent and has no side
/// effects, so callers re-invoke it freely: on mount, on foreground, on
/// pull-to-refresh, and on every change-feed signal.
pub async fn display_balance<S: LedgerStore>(store: &S, user_id: UserId) -> DisplayBalance {
    match store.wallets_for_user(user_id).await {
        Ok(wallets) => {
            let amount = wallets.iter().map(|wallet| wallet.balance).sum();
            let currency = wallets
                .first()
                .map(|wallet| wallet.currency.clone())
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_owned());

            DisplayBalance { amount, currency }
        }
        Err(error) => {
            tracing::warn!("could not read wallets for user {user_id}, displaying zero: {error}");
            DisplayBalance::zero()
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
