//! The boundary between the ledger subsystem and the backing store.
//!
//! [LedgerStore] is the interface the write protocol, balance materializer,
//! and flow aggregator are written against. [sqlite::SqliteLedgerStore] is
//! the shipped implementation.
//!
//! Change notifications deliberately carry no row data: an event only says
//! that a row matching the subscription's filter was touched. Consumers must
//! re-read rather than trust the event payload, which keeps them correct
//! under at-least-once delivery.

pub mod sqlite;

use tokio::sync::broadcast::{self, error::RecvError};

use crate::{
    Error,
    database_id::{UserId, WalletId},
    transaction::{Transaction, TransactionBuilder},
    wallet::Wallet,
};

/// The tables covered by change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// The wallets table.
    Wallets,
    /// The transactions table.
    Transactions,
}

/// The kind of row-level change a [ChangeEvent] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// A row was inserted.
    Insert,
    /// A row was updated.
    Update,
    /// A row was deleted.
    Delete,
    /// Something changed, but the kind is unknown (e.g. events were missed).
    Wildcard,
}

/// A notification that a row matching a subscription's filter changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    /// The table the changed row belongs to.
    pub table: TableKind,
    /// What happened to the row.
    pub kind: ChangeKind,
    /// The user whose data changed.
    pub user_id: UserId,
}

/// A change-notification stream filtered to one table and one user.
///
/// Obtained from [LedgerStore::subscribe].
#[derive(Debug)]
pub struct ChangeSubscription {
    receiver: broadcast::Receiver<ChangeEvent>,
    table: TableKind,
    user_id: UserId,
}

impl ChangeSubscription {
    pub(crate) fn new(
        receiver: broadcast::Receiver<ChangeEvent>,
        table: TableKind,
        user_id: UserId,
    ) -> Self {
        Self {
            receiver,
            table,
            user_id,
        }
    }

    /// Wait for the next event matching the subscription's filter.
    ///
    /// Returns `None` once the notification channel has closed; no further
    /// events will be delivered after that point. If the subscriber fell
    /// behind and events were discarded, a [ChangeKind::Wildcard] event is
    /// returned so the consumer re-reads.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.table == self.table && event.user_id == self.user_id => {
                    return Some(event);
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(missed)) => {
                    tracing::debug!("change subscription lagged, missed {missed} events");
                    return Some(ChangeEvent {
                        table: self.table,
                        kind: ChangeKind::Wildcard,
                        user_id: self.user_id,
                    });
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

/// Handles reads, writes, and change notifications for wallets and
/// transactions.
///
/// Every method that touches the store is a suspension point bounded by the
/// implementation's per-call timeout; a timed-out call surfaces as
/// [Error::Timeout] and is treated like any other failure.
#[allow(async_fn_in_trait)]
pub trait LedgerStore: Send + Sync {
    /// Retrieve a wallet by its id.
    async fn wallet(&self, id: WalletId) -> Result<Wallet, Error>;

    /// Retrieve all wallets owned by `user_id`, oldest first.
    async fn wallets_for_user(&self, user_id: UserId) -> Result<Vec<Wallet>, Error>;

    /// Retrieve the most recently created wallet owned by `user_id`, if any.
    async fn latest_wallet(&self, user_id: UserId) -> Result<Option<Wallet>, Error>;

    /// Create a new wallet for `user_id` with a balance of zero.
    async fn create_wallet(
        &self,
        user_id: UserId,
        name: &str,
        currency: &str,
    ) -> Result<Wallet, Error>;

    /// Set the materialized balance of `wallet_id` to `new_balance`.
    async fn update_balance(
        &self,
        user_id: UserId,
        wallet_id: WalletId,
        new_balance: f64,
    ) -> Result<(), Error>;

    /// Append a new transaction to the log.
    async fn insert_transaction(&self, builder: TransactionBuilder)
    -> Result<Transaction, Error>;

    /// Delete the most recently written transaction matching the user,
    /// wallet, and amount. Returns whether a row was removed.
    async fn delete_latest_matching(
        &self,
        user_id: UserId,
        wallet_id: WalletId,
        amount: f64,
    ) -> Result<bool, Error>;

    /// Retrieve all transactions owned by `user_id`, ordered by business date
    /// ascending.
    async fn transactions_for_user(&self, user_id: UserId) -> Result<Vec<Transaction>, Error>;

    /// Open a change-notification stream for `table` rows owned by `user_id`.
    fn subscribe(&self, table: TableKind, user_id: UserId) -> ChangeSubscription;
}
