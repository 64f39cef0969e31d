//! Defines the core data models and database queries for transactions.

use rusqlite::{
    Connection, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    database_id::{TransactionId, UserId, WalletId},
    wallet::DEFAULT_CURRENCY,
};

// ============================================================================
// MODELS
// ============================================================================

/// Whether a transaction brought money into a wallet or took money out.
///
/// The kind determines the sign applied when the amount is folded into the
/// wallet balance: income is positive, expense is negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Money earned, e.g. a deposit or salary payment.
    Income,
    /// Money spent, e.g. a purchase or bill payment.
    Expense,
}

impl TransactionKind {
    /// The string stored in the database for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
        }
    }
}

impl ToSql for TransactionKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for TransactionKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "income" => Ok(TransactionKind::Income),
            "expense" => Ok(TransactionKind::Expense),
            other => Err(FromSqlError::Other(
                format!("unknown transaction type {other:?}").into(),
            )),
        }
    }
}

/// An event where money was either earned or spent from a wallet.
///
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The ID of the user who owns the transaction.
    pub user_id: UserId,
    /// The ID of the wallet the transaction belongs to.
    pub wallet_id: Option<WalletId>,
    /// Whether the transaction is income or an expense.
    pub kind: TransactionKind,
    /// The amount of money earned or spent. Always greater than zero; the
    /// sign is applied by [Transaction::signed_amount].
    pub amount: f64,
    /// The currency code, matching the owning wallet.
    pub currency: String,
    /// The merchant or counterparty, if known.
    pub merchant: Option<String>,
    /// The category of the transaction, e.g. "Groceries", "Transport".
    pub category: String,
    /// A free-text description of what the transaction was for.
    pub description: Option<String>,
    /// When the transaction happened (the business date). May be backdated,
    /// and demo data occasionally carries future dates.
    pub date: Date,
    /// When the transaction was written to the store. Always no later than
    /// now, regardless of the business date.
    pub created_at: OffsetDateTime,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    pub fn build(user_id: UserId, kind: TransactionKind, amount: f64, date: Date) -> TransactionBuilder {
        TransactionBuilder {
            user_id,
            kind,
            amount,
            date,
            wallet_id: None,
            currency: DEFAULT_CURRENCY.to_owned(),
            merchant: None,
            category: "General".to_owned(),
            description: None,
        }
    }

    /// The amount with the sign implied by the transaction kind: positive for
    /// income, negative for expenses.
    pub fn signed_amount(&self) -> f64 {
        match self.kind {
            TransactionKind::Income => self.amount,
            TransactionKind::Expense => -self.amount,
        }
    }
}

/// A builder for creating [Transaction] instances.
///
/// Provides sensible defaults for the optional fields; pass the finished
/// builder to [create_transaction] (or a store's insert method) to get the
/// stored [Transaction] back.
#[derive(Debug, PartialEq, Clone)]
pub struct TransactionBuilder {
    /// The ID of the user who owns the transaction.
    pub user_id: UserId,
    /// Whether the transaction is income or an expense.
    pub kind: TransactionKind,
    /// The amount of money earned or spent. Must be greater than zero.
    pub amount: f64,
    /// The business date of the transaction.
    pub date: Date,
    /// The wallet the transaction belongs to.
    pub wallet_id: Option<WalletId>,
    /// The currency code. Should match the owning wallet's currency.
    pub currency: String,
    /// The merchant or counterparty, if known.
    pub merchant: Option<String>,
    /// The category of the transaction. Defaults to "General".
    pub category: String,
    /// A free-text description of the transaction.
    pub description: Option<String>,
}

impl TransactionBuilder {
    /// Set the wallet the transaction belongs to.
    pub fn wallet_id(mut self, wallet_id: WalletId) -> Self {
        self.wallet_id = Some(wallet_id);
        self
    }

    /// Set the currency code for the transaction.
    pub fn currency(mut self, currency: &str) -> Self {
        self.currency = currency.to_owned();
        self
    }

    /// Set the merchant or counterparty label.
    pub fn merchant(mut self, merchant: &str) -> Self {
        self.merchant = Some(merchant.to_owned());
        self
    }

    /// Set the category of the transaction.
    pub fn category(mut self, category: &str) -> Self {
        self.category = category.to_owned();
        self
    }

    /// Set the free-text description of the transaction.
    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_owned());
        self
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

const TRANSACTION_COLUMNS: &str = "id, user_id, wallet_id, type, amount, currency, merchant, \
     category, description, transaction_date, created_at";

/// Create the transactions table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                wallet_id INTEGER,
                type TEXT NOT NULL,
                amount REAL NOT NULL,
                currency TEXT NOT NULL,
                merchant TEXT,
                category TEXT NOT NULL,
                description TEXT,
                transaction_date TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY(wallet_id) REFERENCES wallets(id)
                )",
        (),
    )?;

    // Composite index used by the balance and flow read paths.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_user_date
         ON transactions(user_id, transaction_date);",
        (),
    )?;

    Ok(())
}

/// Map a database row to a [Transaction].
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        wallet_id: row.get(2)?,
        kind: row.get(3)?,
        amount: row.get(4)?,
        currency: row.get(5)?,
        merchant: row.get(6)?,
        category: row.get(7)?,
        description: row.get(8)?,
        date: row.get(9)?,
        created_at: row.get(10)?,
    })
}

/// Create a new transaction in the database from a builder.
///
/// The write timestamp is set to the current time; the business date is taken
/// from the builder as-is.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn create_transaction(
    builder: TransactionBuilder,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let created_at = OffsetDateTime::now_utc();

    let transaction = connection
        .prepare(&format!(
            "INSERT INTO transactions
                 (user_id, wallet_id, type, amount, currency, merchant, category, description,
                  transaction_date, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             RETURNING {TRANSACTION_COLUMNS}",
        ))?
        .query_row(
            (
                builder.user_id,
                builder.wallet_id,
                builder.kind,
                builder.amount,
                builder.currency,
                builder.merchant,
                builder.category,
                builder.description,
                builder.date,
                created_at,
            ),
            map_transaction_row,
        )?;

    Ok(transaction)
}

/// Retrieve all transactions owned by `user_id`, ordered by business date
/// ascending.
///
/// No date-range filter is applied: backdated and forward-dated rows are
/// included so that aggregation never silently drops them.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn get_transactions_by_user(
    user_id: UserId,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let transactions = connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions
             WHERE user_id = :user_id
             ORDER BY transaction_date ASC, created_at ASC, id ASC",
        ))?
        .query_map(&[(":user_id", &user_id)], map_transaction_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(transactions)
}

/// Delete the most recently written transaction matching `user_id`,
/// `wallet_id`, and `amount`.
///
/// This is the compensating rollback used when a balance update fails after
/// the transaction insert succeeded. Returns whether a row was removed.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn delete_latest_matching(
    user_id: UserId,
    wallet_id: WalletId,
    amount: f64,
    connection: &Connection,
) -> Result<bool, Error> {
    let rows_deleted = connection.execute(
        "DELETE FROM transactions WHERE id = (
             SELECT id FROM transactions
             WHERE user_id = ?1 AND wallet_id = ?2 AND amount = ?3
             ORDER BY created_at DESC, id DESC
             LIMIT 1
         )",
        (user_id, wallet_id, amount),
    )?;

    Ok(rows_deleted > 0)
}

// ============================================================================
// TESTS
// ============================================================================
