//! Implements a SQLite backed ledger store.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use rusqlite::Connection;
use tokio::sync::broadcast;

use crate::{
    Error,
    database_id::{UserId, WalletId},
    store::{ChangeEvent, ChangeKind, ChangeSubscription, LedgerStore, TableKind},
    transaction::{
        Transaction, TransactionBuilder, create_transaction, delete_latest_matching,
        get_transactions_by_user,
    },
    wallet::{
        Wallet, create_wallet, get_latest_wallet, get_wallet, get_wallets_by_user,
        update_wallet_balance,
    },
};

/// How long a single store call may take before it fails with
/// [Error::Timeout].
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(8);

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Stores wallets and transactions in a SQLite database.
///
/// Queries run on the blocking thread pool and are bounded by a per-call
/// timeout. Every successful write broadcasts a [ChangeEvent] to all open
/// subscriptions.
#[derive(Debug, Clone)]
pub struct SqliteLedgerStore {
    connection: Arc<Mutex<Connection>>,
    events: broadcast::Sender<ChangeEvent>,
    call_timeout: Duration,
}

impl SqliteLedgerStore {
    /// Create a new store for the SQLite `connection` with the default
    /// per-call timeout.
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self::with_timeout(connection, DEFAULT_CALL_TIMEOUT)
    }

    /// Create a new store for the SQLite `connection` with a custom per-call
    /// timeout.
    pub fn with_timeout(connection: Arc<Mutex<Connection>>, call_timeout: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            connection,
            events,
            call_timeout,
        }
    }

    /// Run `op` against the connection on the blocking pool, bounded by the
    /// call timeout.
    async fn run<T, F>(&self, op: F) -> Result<T, Error>
    where
        F: FnOnce(&Connection) -> Result<T, Error> + Send + 'static,
        T: Send + 'static,
    {
        let connection = Arc::clone(&self.connection);
        let task = tokio::task::spawn_blocking(move || {
            let connection = connection.lock().map_err(|_| Error::DatabaseLockError)?;
            op(&connection)
        });

        match tokio::time::timeout(self.call_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(Error::TaskFailed(join_error.to_string())),
            Err(_) => Err(Error::Timeout),
        }
    }

    fn notify(&self, table: TableKind, kind: ChangeKind, user_id: UserId) {
        // Send errors only mean there are no subscribers right now.
        let _ = self.events.send(ChangeEvent {
            table,
            kind,
            user_id,
        });
    }
}

impl LedgerStore for SqliteLedgerStore {
    async fn wallet(&self, id: WalletId) -> Result<Wallet, Error> {
        self.run(move |conn| get_wallet(id, conn)).await
    }

    async fn wallets_for_user(&self, user_id: UserId) -> Result<Vec<Wallet>, Error> {
        self.run(move |conn| get_wallets_by_user(user_id, conn)).await
    }

    async fn latest_wallet(&self, user_id: UserId) -> Result<Option<Wallet>, Error> {
        self.run(move |conn| get_latest_wallet(user_id, conn)).await
    }

    async fn create_wallet(
        &self,
        user_id: UserId,
        name: &str,
        currency: &str,
    ) -> Result<Wallet, Error> {
        let name = name.to_owned();
        let currency = currency.to_owned();

        let wallet = self
            .run(move |conn| create_wallet(user_id, &name, &currency, conn))
            .await?;

        self.notify(TableKind::Wallets, ChangeKind::Insert, user_id);

        Ok(wallet)
    }

    async fn update_balance(
        &self,
        user_id: UserId,
        wallet_id: WalletId,
        new_balance: f64,
    ) -> Result<(), Error> {
        self.run(move |conn| update_wallet_balance(wallet_id, new_balance, conn))
            .await?;

        self.notify(TableKind::Wallets, ChangeKind::Update, user_id);

        Ok(())
    }

    async fn insert_transaction(
        &self,
        builder: TransactionBuilder,
    ) -> Result<Transaction, Error> {
        let user_id = builder.user_id;

        let transaction = self.run(move |conn| create_transaction(builder, conn)).await?;

        self.notify(TableKind::Transactions, ChangeKind::Insert, user_id);

        Ok(transaction)
    }

    async fn delete_latest_matching(
        &self,
        user_id: UserId,
        wallet_id: WalletId,
        amount: f64,
    ) -> Result<bool, Error> {
        let deleted = self
            .run(move |conn| delete_latest_matching(user_id, wallet_id, amount, conn))
            .await?;

        if deleted {
            self.notify(TableKind::Transactions, ChangeKind::Delete, user_id);
        }

        Ok(deleted)
    }

    async fn transactions_for_user(&self, user_id: UserId) -> Result<Vec<Transaction>, Error> {
        self.run(move |conn| get_transactions_by_user(user_id, conn))
            .await
    }

    fn subscribe(&self, table: TableKind, user_id: UserId) -> ChangeSubscription {
        ChangeSubscription::new(self.events.subscribe(), table, user_id)
    }
}

// ============================================================================
// TESTS
// ============================================================================
