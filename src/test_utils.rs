//! Utility functions shared between test modules.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::{
    Error,
    database_id::{UserId, WalletId},
    db::initialize,
    store::{ChangeSubscription, LedgerStore, TableKind, sqlite::SqliteLedgerStore},
    transaction::{Transaction, TransactionBuilder},
    wallet::Wallet,
};

/// Create a ledger store backed by a fresh in-memory SQLite database.
pub fn open_in_memory_store() -> SqliteLedgerStore {
    let connection = Connection::open_in_memory().expect("Could not open in-memory database");
    initialize(&connection).expect("Could not initialise database");

    SqliteLedgerStore::new(Arc::new(Mutex::new(connection)))
}

/// A store wrapper that fails selected operations with [Error::Timeout],
/// delegating everything else to the wrapped store.
///
/// Used to force the partial-failure paths of the write protocol and the
/// safe-zero path of the balance materializer.
pub struct FailingStore {
    inner: SqliteLedgerStore,
    fail_insert: bool,
    fail_update_balance: bool,
    fail_delete: bool,
    fail_reads: bool,
}

impl FailingStore {
    pub fn new(inner: SqliteLedgerStore) -> Self {
        Self {
            inner,
            fail_insert: false,
            fail_update_balance: false,
            fail_delete: false,
            fail_reads: false,
        }
    }

    /// Fail transaction inserts.
    pub fn fail_insert(mut self) -> Self {
        self.fail_insert = true;
        self
    }

    /// Fail wallet balance updates.
    pub fn fail_update_balance(mut self) -> Self {
        self.fail_update_balance = true;
        self
    }

    /// Fail the compensating transaction delete.
    pub fn fail_delete(mut self) -> Self {
        self.fail_delete = true;
        self
    }

    /// Fail all read operations.
    pub fn fail_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }
}

impl LedgerStore for FailingStore {
    async fn wallet(&self, id: WalletId) -> Result<Wallet, Error> {
        if self.fail_reads {
            return Err(Error::Timeout);
        }
        self.inner.wallet(id).await
    }

    async fn wallets_for_user(&self, user_id: UserId) -> Result<Vec<Wallet>, Error> {
        if self.fail_reads {
            return Err(Error::Timeout);
        }
        self.inner.wallets_for_user(user_id).await
    }

    async fn latest_wallet(&self, user_id: UserId) -> Result<Option<Wallet>, Error> {
        if self.fail_reads {
            return Err(Error::Timeout);
        }
        self.inner.latest_wallet(user_id).await
    }

    async fn create_wallet(
        &self,
        user_id: UserId,
        name: &str,
        currency: &str,
    ) -> Result<Wallet, Error> {
        self.inner.create_wallet(user_id, name, currency).await
    }

    async fn update_balance(
        &self,
        user_id: UserId,
        wallet_id: WalletId,
        new_balance: f64,
    ) -> Result<(), Error> {
        if self.fail_update_balance {
            return Err(Error::Timeout);
        }
        self.inner.update_balance(user_id, wallet_id, new_balance).await
    }

    async fn insert_transaction(
        &self,
        builder: TransactionBuilder,
    ) -> Result<Transaction, Error> {
        if self.fail_insert {
            return Err(Error::Timeout);
        }
        self.inner.insert_transaction(builder).await
    }

    async fn delete_latest_matching(
        &self,
        user_id: UserId,
        wallet_id: WalletId,
        amount: f64,
    ) -> Result<bool, Error> {
        if self.fail_delete {
            return Err(Error::Timeout);
        }
        self.inner
            .delete_latest_matching(user_id, wallet_id, amount)
            .await
    }

    async fn transactions_for_user(&self, user_id: UserId) -> Result<Vec<Transaction>, Error> {
        if self.fail_reads {
            return Err(Error::Timeout);
        }
        self.inner.transactions_for_user(user_id).await
    }

    fn subscribe(&self, table: TableKind, user_id: UserId) -> ChangeSubscription {
        self.inner.subscribe(table, user_id)
    }
}
