//! The ledger write protocol.
//!
//! Applies a single financial event as an atomic-from-the-caller's-perspective
//! change to both the transaction log and the materialized wallet balance,
//! even though the store only offers independent single-row writes.

use time::{Date, OffsetDateTime};

use crate::{
    Error,
    database_id::{UserId, WalletId},
    store::LedgerStore,
    transaction::{Transaction, TransactionKind},
    wallet::DEFAULT_CURRENCY,
};

/// The name given to a wallet that is created lazily because the user had
/// none when their first ledger event arrived.
const LAZY_WALLET_NAME: &str = "Main wallet";

/// A deposit or expense to be applied to a wallet.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEvent {
    /// The user the event belongs to.
    pub user_id: UserId,
    /// The wallet to apply the event to. When `None`, the user's most
    /// recently created wallet is used, lazily created with a zero balance if
    /// the user has none.
    pub wallet_id: Option<WalletId>,
    /// Whether the event is income or an expense.
    pub kind: TransactionKind,
    /// The amount of money involved. Must be finite and greater than zero.
    pub amount: f64,
    /// The merchant or counterparty, if known.
    pub merchant: Option<String>,
    /// The category of the event.
    pub category: String,
    /// A free-text description of the event.
    pub description: Option<String>,
    /// The business date of the event. Defaults to today (UTC) when `None`.
    pub date: Option<Date>,
}

impl LedgerEvent {
    /// Create a new event with the optional fields left at their defaults.
    pub fn new(user_id: UserId, kind: TransactionKind, amount: f64) -> Self {
        Self {
            user_id,
            wallet_id: None,
            kind,
            amount,
            merchant: None,
            category: "General".to_owned(),
            description: None,
            date: None,
        }
    }

    /// Set the wallet to apply the event to.
    pub fn wallet_id(mut self, wallet_id: WalletId) -> Self {
        self.wallet_id = Some(wallet_id);
        self
    }

    /// Set the category of the event.
    pub fn category(mut self, category: &str) -> Self {
        self.category = category.to_owned();
        self
    }

    /// Set the merchant or counterparty label.
    pub fn merchant(mut self, merchant: &str) -> Self {
        self.merchant = Some(merchant.to_owned());
        self
    }

    /// Set the free-text description of the event.
    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_owned());
        self
    }

    /// Set the business date of the event.
    pub fn date(mut self, date: Date) -> Self {
        self.date = Some(date);
        self
    }
}

/// The result of a successfully applied ledger event.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerReceipt {
    /// The transaction row that was appended to the log.
    pub transaction: Transaction,
    /// The wallet balance after the event was folded in.
    pub new_balance: f64,
}

/// Apply a deposit or expense to a wallet and its transaction log.
///
/// The steps always run in the same order: resolve the target wallet, insert
/// the transaction row, then update the wallet balance. The ordering is what
/// makes the rollback meaningful: a failed balance update always has a
/// transaction to roll back, and a failed insert never leaves a dangling
/// balance mutation.
///
/// If the balance update fails after the insert succeeded, the just-inserted
/// row is deleted again (matched by user, wallet, amount, and most recent
/// write time) and the update error is returned. If that compensating delete
/// also fails, the log is left overstating history relative to the stale
/// balance; this is logged as a reconciliation defect and surfaced as
/// [Error::ReconciliationDefect] rather than silently hidden.
///
/// Concurrent calls against the same wallet are not serialized: two
/// simultaneous deposits race on reading the current balance and can lose one
/// increment. Callers are expected not to fire overlapping writes for one
/// wallet faster than a user can trigger them through the UI.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAmount] if the amount is not a finite number greater than
///   zero (checked before any store call),
/// - [Error::NotFound] if an explicit `wallet_id` does not refer to a wallet,
/// - [Error::ReconciliationDefect] if both the balance update and the
///   compensating delete failed,
/// - or any store error from the failing step.
pub async fn apply_ledger_event<S: LedgerStore>(
    store: &S,
    event: LedgerEvent,
) -> Result<LedgerReceipt, Error> {
    if !event.amount.is_finite() || event.amount <= 0.0 {
        return Err(Error::InvalidAmount(event.amount));
    }

    let wallet = match event.wallet_id {
        Some(id) => store.wallet(id).await?,
        None => match store.latest_wallet(event.user_id).await? {
            Some(wallet) => wallet,
            None => {
                store
                    .create_wallet(event.user_id, LAZY_WALLET_NAME, DEFAULT_CURRENCY)
                    .await?
            }
        },
    };

    let date = event
        .date
        .unwrap_or_else(|| OffsetDateTime::now_utc().date());

    let mut builder = Transaction::build(event.user_id, event.kind, event.amount, date)
        .wallet_id(wallet.id)
        .currency(&wallet.currency)
        .category(&event.category);
    if let Some(merchant) = &event.merchant {
        builder = builder.merchant(merchant);
    }
    if let Some(description) = &event.description {
        builder = builder.description(description);
    }

    let transaction = store.insert_transaction(builder).await?;

    let new_balance = wallet.balance + transaction.signed_amount();

    match store
        .update_balance(wallet.user_id, wallet.id, new_balance)
        .await
    {
        Ok(()) => Ok(LedgerReceipt {
            transaction,
            new_balance,
        }),
        Err(update_error) => {
            tracing::warn!(
                "balance update for wallet {} failed, rolling back transaction {}: {update_error}",
                wallet.id,
                transaction.id
            );

            match store
                .delete_latest_matching(event.user_id, wallet.id, transaction.amount)
                .await
            {
                Ok(true) => Err(update_error),
                Ok(false) | Err(_) => {
                    tracing::error!(
                        wallet_id = wallet.id,
                        transaction_id = transaction.id,
                        "reconciliation defect: transaction inserted but the balance update \
                         and the compensating delete both failed"
                    );
                    Err(Error::ReconciliationDefect(transaction.id))
                }
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
