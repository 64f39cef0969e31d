//! The facade display views consume.

use std::time::Duration;

use crate::{
    Error,
    balance::{DisplayBalance, display_balance},
    change_feed::{ChangeFeed, DEFAULT_DEBOUNCE},
    database_id::UserId,
    flow::{FlowBucket, Granularity, flow_series},
    ledger::{LedgerEvent, LedgerReceipt, apply_ledger_event},
    store::LedgerStore,
};

/// Bundles the ledger subsystem behind the four operations display views
/// call: apply an event, read the display balance, read a flow series, and
/// subscribe to changes.
///
/// Cheap to clone a reference to; views share one service per session.
#[derive(Debug)]
pub struct LedgerService<S: LedgerStore> {
    store: S,
    debounce: Duration,
}

impl<S: LedgerStore> LedgerService<S> {
    /// Create a service over `store` with the default refresh debounce.
    pub fn new(store: S) -> Self {
        Self::with_debounce(store, DEFAULT_DEBOUNCE)
    }

    /// Create a service over `store` with a custom refresh debounce.
    pub fn with_debounce(store: S, debounce: Duration) -> Self {
        Self { store, debounce }
    }

    /// Apply a deposit or expense to the user's wallet and transaction log.
    ///
    /// See [apply_ledger_event] for ordering, rollback, and error behavior.
    pub async fn apply_ledger_event(&self, event: LedgerEvent) -> Result<LedgerReceipt, Error> {
        apply_ledger_event(&self.store, event).await
    }

    /// Get the total balance across all of the user's wallets, substituting a
    /// safe zero if the wallets cannot be read.
    pub async fn display_balance(&self, user_id: UserId) -> DisplayBalance {
        display_balance(&self.store, user_id).await
    }

    /// Get the money-in/money-out series for the user at the requested
    /// granularity.
    ///
    /// # Errors
    /// Returns the store error if the transaction log could not be read.
    pub async fn flow_series(
        &self,
        user_id: UserId,
        granularity: Granularity,
    ) -> Result<Vec<FlowBucket>, Error> {
        flow_series(&self.store, user_id, granularity).await
    }

    /// Open a change feed for the user: a live bridge from store change
    /// notifications to refresh signals, closed when the returned feed is
    /// dropped.
    pub fn subscribe_to_changes(&self, user_id: UserId) -> ChangeFeed {
        ChangeFeed::open(&self.store, user_id, self.debounce)
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }
}

// ============================================================================
// TESTS
// ============================================================================
