//! Database ID type definitions.

/// Alias for the integer type used for mapping to database IDs.
pub type DatabaseId = i64;

/// The ID of a user who owns wallets and transactions.
pub type UserId = DatabaseId;

/// The ID of a wallet row.
pub type WalletId = DatabaseId;

/// The ID of a transaction row.
pub type TransactionId = DatabaseId;
