//! Database initialization for the ledger subsystem.

use rusqlite::Connection;

use crate::{transaction::create_transaction_table, wallet::create_wallet_table};

/// Create the tables for the domain models in the database.
///
/// # Errors
/// Returns an error if a table cannot be created or if there is an SQL error.
pub fn initialize(connection: &Connection) -> Result<(), rusqlite::Error> {
    create_wallet_table(connection)?;
    create_transaction_table(connection)?;

    Ok(())
}
