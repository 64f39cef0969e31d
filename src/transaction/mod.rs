//! Transaction management for the ledger subsystem.
//!
//! Transactions are the append-only log behind every wallet balance: created
//! exactly once by the write protocol, immutable thereafter. The only delete
//! path in normal operation is the compensating rollback of a just-inserted
//! row.

mod core;

pub use core::{
    Transaction, TransactionBuilder, TransactionKind, create_transaction,
    create_transaction_table, delete_latest_matching, get_transactions_by_user,
    map_transaction_row,
};
