//! Defines the core data model and database queries for wallets.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    database_id::{UserId, WalletId},
};

/// The currency assigned to wallets that are created lazily, before the user
/// has picked one.
pub const DEFAULT_CURRENCY: &str = "USD";

// ============================================================================
// MODELS
// ============================================================================

/// A container for a user's money, summarised by a materialized balance.
///
/// The balance is always the signed sum of the wallet's transactions (income
/// positive, expense negative) whenever no write is in flight. It is a stored
/// field rather than a value recomputed by summation on every read, so it
/// must only ever be mutated through [crate::apply_ledger_event].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    /// The ID of the wallet.
    pub id: WalletId,
    /// The ID of the user who owns the wallet.
    pub user_id: UserId,
    /// The display name of the wallet.
    pub name: String,
    /// The materialized balance of the wallet.
    pub balance: f64,
    /// The currency code for the wallet and all of its transactions.
    pub currency: String,
    /// Whether the wallet has been locked by its owner.
    pub is_locked: bool,
    /// When the lock expires, if the wallet is locked with a deadline.
    pub lock_until: Option<OffsetDateTime>,
    /// When the wallet was created.
    pub created_at: OffsetDateTime,
    /// When the wallet was last updated.
    pub updated_at: OffsetDateTime,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the wallets table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_wallet_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS wallets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                balance REAL NOT NULL,
                currency TEXT NOT NULL,
                is_locked INTEGER NOT NULL DEFAULT 0,
                lock_until TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_wallets_user ON wallets(user_id, created_at);",
        (),
    )?;

    Ok(())
}

/// Map a database row to a [Wallet].
pub fn map_wallet_row(row: &Row) -> Result<Wallet, rusqlite::Error> {
    Ok(Wallet {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        balance: row.get(3)?,
        currency: row.get(4)?,
        is_locked: row.get(5)?,
        lock_until: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

const WALLET_COLUMNS: &str =
    "id, user_id, name, balance, currency, is_locked, lock_until, created_at, updated_at";

/// Create a new wallet for `user_id` with a balance of zero.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn create_wallet(
    user_id: UserId,
    name: &str,
    currency: &str,
    connection: &Connection,
) -> Result<Wallet, Error> {
    let now = OffsetDateTime::now_utc();

    let wallet = connection
        .prepare(&format!(
            "INSERT INTO wallets (user_id, name, balance, currency, is_locked, created_at, updated_at)
             VALUES (?1, ?2, 0, ?3, 0, ?4, ?4)
             RETURNING {WALLET_COLUMNS}",
        ))?
        .query_row((user_id, name, currency, now), map_wallet_row)?;

    Ok(wallet)
}

/// Retrieve a wallet from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid wallet,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_wallet(id: WalletId, connection: &Connection) -> Result<Wallet, Error> {
    let wallet = connection
        .prepare(&format!("SELECT {WALLET_COLUMNS} FROM wallets WHERE id = :id"))?
        .query_one(&[(":id", &id)], map_wallet_row)?;

    Ok(wallet)
}

/// Retrieve all wallets owned by `user_id`, oldest first.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn get_wallets_by_user(user_id: UserId, connection: &Connection) -> Result<Vec<Wallet>, Error> {
    let wallets = connection
        .prepare(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets
             WHERE user_id = :user_id
             ORDER BY created_at ASC, id ASC",
        ))?
        .query_map(&[(":user_id", &user_id)], map_wallet_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(wallets)
}

/// Retrieve the most recently created wallet owned by `user_id`, if any.
///
/// Creation-time ties are broken by the higher row id.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn get_latest_wallet(
    user_id: UserId,
    connection: &Connection,
) -> Result<Option<Wallet>, Error> {
    let result = connection
        .prepare(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets
             WHERE user_id = :user_id
             ORDER BY created_at DESC, id DESC
             LIMIT 1",
        ))?
        .query_one(&[(":user_id", &user_id)], map_wallet_row);

    match result {
        Ok(wallet) => Ok(Some(wallet)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(error) => Err(error.into()),
    }
}

/// Set the materialized balance of wallet `id` to `new_balance`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid wallet,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_wallet_balance(
    id: WalletId,
    new_balance: f64,
    connection: &Connection,
) -> Result<(), Error> {
    let now = OffsetDateTime::now_utc();

    let rows_updated = connection.execute(
        "UPDATE wallets SET balance = ?1, updated_at = ?2 WHERE id = ?3",
        (new_balance, now, id),
    )?;

    if rows_updated == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
