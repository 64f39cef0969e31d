//! The change propagation layer.
//!
//! Bridges row-level change notifications from the store into refresh signals
//! for every view currently observing a user's data, so views stay fresh
//! without polling. Refresh signals carry no data: consumers re-read their
//! values (balance, flow series) on every signal, which keeps them correct
//! under at-least-once delivery.

use std::time::Duration;

use tokio::{
    sync::broadcast,
    task::JoinHandle,
    time::{sleep, timeout},
};

use crate::{
    database_id::UserId,
    store::{ChangeSubscription, LedgerStore, TableKind},
};

/// How long to wait after a change notification before signalling a refresh.
///
/// The delay is short but deliberately not zero: it absorbs the store's
/// eventual-consistency lag and coalesces bursts of notifications (one ledger
/// write touches both tables) into a single refresh.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

const REFRESH_CHANNEL_CAPACITY: usize = 16;

/// A signal that registered consumers should re-read their values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    /// The store reported a change to the observed user's rows.
    StoreChange,
    /// A view that completed a local write asked its siblings to update
    /// immediately rather than waiting on the notification round-trip.
    Manual,
}

/// A live bridge from store change notifications to refresh signals for one
/// user.
///
/// Opened when a view mounts and closed (or dropped) when it unmounts;
/// nothing is delivered after that point. If the store's notification channel
/// drops, the feed logs a warning and stops. There is no retry with backoff,
/// so live updates stay off until a new feed is opened.
#[derive(Debug)]
pub struct ChangeFeed {
    refresh_tx: broadcast::Sender<Refresh>,
    task: JoinHandle<()>,
}

impl ChangeFeed {
    /// Open a feed for `user_id`, subscribing to wallet and transaction
    /// changes on `store`.
    pub fn open<S: LedgerStore>(store: &S, user_id: UserId, debounce: Duration) -> Self {
        let wallets = store.subscribe(TableKind::Wallets, user_id);
        let transactions = store.subscribe(TableKind::Transactions, user_id);
        let (refresh_tx, _) = broadcast::channel(REFRESH_CHANNEL_CAPACITY);

        let task = tokio::spawn(deliver_refreshes(
            wallets,
            transactions,
            refresh_tx.clone(),
            debounce,
        ));

        Self { refresh_tx, task }
    }

    /// Register a consumer: returns a receiver that yields one [Refresh] per
    /// debounced change (or manual broadcast).
    pub fn on_refresh(&self) -> broadcast::Receiver<Refresh> {
        self.refresh_tx.subscribe()
    }

    /// Tell all registered consumers to re-read immediately, bypassing the
    /// debounce.
    ///
    /// Used by a view that just completed a local write and wants sibling
    /// views to update without waiting for the notification round-trip.
    pub fn broadcast_refresh(&self) {
        let _ = self.refresh_tx.send(Refresh::Manual);
    }

    /// Close the feed. Equivalent to dropping it.
    pub fn close(self) {}
}

impl Drop for ChangeFeed {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn deliver_refreshes(
    mut wallets: ChangeSubscription,
    mut transactions: ChangeSubscription,
    refresh_tx: broadcast::Sender<Refresh>,
    debounce: Duration,
) {
    loop {
        let event = tokio::select! {
            event = wallets.next() => event,
            event = transactions.next() => event,
        };

        let Some(event) = event else {
            tracing::warn!("change notification channel closed; live updates stopped");
            return;
        };
        tracing::debug!(?event, "change event received, debouncing refresh");

        // Keep absorbing events until the debounce window stays quiet, then
        // signal once.
        loop {
            let more = tokio::select! {
                more = wallets.next() => more,
                more = transactions.next() => more,
                _ = sleep(debounce) => break,
            };
            if more.is_none() {
                break;
            }
        }

        let _ = refresh_tx.send(Refresh::StoreChange);
    }
}

/// Wait for the next refresh signal, up to `wait`.
///
/// A convenience for consumers that want to poll-with-deadline instead of
/// holding an open `recv` loop.
pub async fn next_refresh(
    receiver: &mut broadcast::Receiver<Refresh>,
    wait: Duration,
) -> Option<Refresh> {
    match timeout(wait, receiver.recv()).await {
        Ok(Ok(refresh)) => Some(refresh),
        Ok(Err(_)) | Err(_) => None,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod change_feed_tests {
    use std::time::Duration;

    use time::macros::date;
    use tokio::sync::broadcast::error::RecvError;

    use crate::{
        store::LedgerStore,
        test_utils::open_in_memory_store,
        transaction::{Transaction, TransactionKind},
    };

    use super::{ChangeFeed, Refresh};

    const TEST_DEBOUNCE: Duration = Duration::from_millis(20);
    const RECV_DEADLINE: Duration = Duration::from_millis(500);

    async fn recv_within(
        receiver: &mut tokio::sync::broadcast::Receiver<Refresh>,
    ) -> Option<Refresh> {
        super::next_refresh(receiver, RECV_DEADLINE).await
    }

    #[tokio::test]
    async fn store_write_triggers_refresh() {
        let store = open_in_memory_store();
        let feed = ChangeFeed::open(&store, 1, TEST_DEBOUNCE);
        let mut refreshes = feed.on_refresh();

        store
            .insert_transaction(Transaction::build(
                1,
                TransactionKind::Income,
                100.0,
                date!(2025 - 10 - 05),
            ))
            .await
            .expect("Could not insert transaction");

        assert_eq!(recv_within(&mut refreshes).await, Some(Refresh::StoreChange));
    }

    #[tokio::test]
    async fn burst_of_writes_coalesces_into_one_refresh() {
        let store = open_in_memory_store();
        let feed = ChangeFeed::open(&store, 1, Duration::from_millis(100));
        let mut refreshes = feed.on_refresh();

        for amount in [10.0, 20.0, 30.0] {
            store
                .insert_transaction(Transaction::build(
                    1,
                    TransactionKind::Income,
                    amount,
                    date!(2025 - 10 - 05),
                ))
                .await
                .expect("Could not insert transaction");
        }

        assert_eq!(recv_within(&mut refreshes).await, Some(Refresh::StoreChange));
        let second = super::next_refresh(&mut refreshes, Duration::from_millis(200)).await;
        assert_eq!(second, None, "Expected the burst to coalesce");
    }

    #[tokio::test]
    async fn manual_broadcast_bypasses_debounce() {
        let store = open_in_memory_store();
        // A debounce far longer than the test: a debounced signal could never
        // arrive in time, so only the manual path can satisfy the recv.
        let feed = ChangeFeed::open(&store, 1, Duration::from_secs(30));
        let mut refreshes = feed.on_refresh();

        feed.broadcast_refresh();

        assert_eq!(recv_within(&mut refreshes).await, Some(Refresh::Manual));
    }

    #[tokio::test]
    async fn ignores_other_users_writes() {
        let store = open_in_memory_store();
        let feed = ChangeFeed::open(&store, 1, TEST_DEBOUNCE);
        let mut refreshes = feed.on_refresh();

        store
            .insert_transaction(Transaction::build(
                2,
                TransactionKind::Income,
                100.0,
                date!(2025 - 10 - 05),
            ))
            .await
            .expect("Could not insert transaction");

        let refresh = super::next_refresh(&mut refreshes, Duration::from_millis(100)).await;
        assert_eq!(refresh, None, "Expected no refresh for another user");
    }

    #[tokio::test]
    async fn nothing_is_delivered_after_close() {
        let store = open_in_memory_store();
        let feed = ChangeFeed::open(&store, 1, TEST_DEBOUNCE);
        let mut refreshes = feed.on_refresh();

        feed.close();

        store
            .insert_transaction(Transaction::build(
                1,
                TransactionKind::Income,
                100.0,
                date!(2025 - 10 - 05),
            ))
            .await
            .expect("Could not insert transaction");

        assert_eq!(refreshes.recv().await, Err(RecvError::Closed));
    }
}
