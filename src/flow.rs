//! The flow aggregator.
//!
//! Turns the raw transaction log into fixed-shape money-in/money-out series
//! for a two-line chart, independent of how sparse or clustered the
//! underlying dates are. Buckets are recomputed from the live log on every
//! request rather than kept incrementally, so retroactive deletes are
//! tolerated for free.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    Error,
    database_id::UserId,
    store::LedgerStore,
    transaction::{Transaction, TransactionKind},
};

/// The bucket granularities a flow series can be requested at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// Seven day buckets.
    Week,
    /// Six multi-day buckets spanning a month.
    Month,
    /// Twelve month buckets.
    Year,
}

/// One bucket of a flow series: the money earned and spent within one time
/// span.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowBucket {
    /// The bucket label: a day number for week/month granularity, or a month
    /// abbreviation for year granularity.
    pub label: String,
    /// The total of income transactions in the bucket.
    pub money_in: f64,
    /// The total of expense transactions in the bucket.
    pub money_out: f64,
}

/// The days pre-seeded for the month view, roughly five-day spans.
const MONTH_SEED_DAYS: [u8; 6] = [1, 6, 11, 16, 21, 26];

const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Get the flow series for `user_id` at the requested granularity.
///
/// The whole transaction log is fetched, ordered by business date ascending
/// and without a date-range filter. Seed and demo data may carry dates far
/// outside any "last N days" window, and those rows must still land in a
/// bucket rather than being dropped.
///
/// An empty log returns the seeded zero buckets (7, 6, or 12 of them), never
/// an empty list, so charts render a flat baseline instead of collapsing.
///
/// # Errors
/// Returns the store error if the transaction log could not be read; callers
/// show a retry prompt rather than an empty chart.
pub async fn flow_series<S: LedgerStore>(
    store: &S,
    user_id: UserId,
    granularity: Granularity,
) -> Result<Vec<FlowBucket>, Error> {
    let transactions = store.transactions_for_user(user_id).await?;

    Ok(bucket_transactions(&transactions, granularity))
}

/// Fold transactions into the seeded buckets for `granularity`.
///
/// Seeding guarantees a minimum shape, not an exhaustive one: a business date
/// outside the seeded keys (e.g. day 30 in the month view) creates an ad-hoc
/// bucket instead of being dropped. The map is keyed by day number or month
/// number, so buckets come out in numeric day order for week/month and
/// calendar order for year, never lexicographic label order.
fn bucket_transactions(transactions: &[Transaction], granularity: Granularity) -> Vec<FlowBucket> {
    match granularity {
        Granularity::Week => bucket_by_day(transactions, 1..=7),
        Granularity::Month => bucket_by_day(transactions, MONTH_SEED_DAYS),
        Granularity::Year => bucket_by_month(transactions),
    }
}

fn bucket_by_day(
    transactions: &[Transaction],
    seed_days: impl IntoIterator<Item = u8>,
) -> Vec<FlowBucket> {
    let mut totals: BTreeMap<u8, (f64, f64)> =
        seed_days.into_iter().map(|day| (day, (0.0, 0.0))).collect();

    for transaction in transactions {
        let (money_in, money_out) = totals.entry(transaction.date.day()).or_insert((0.0, 0.0));
        add_to_bucket(transaction, money_in, money_out);
    }

    totals
        .into_iter()
        .map(|(day, (money_in, money_out))| FlowBucket {
            label: day.to_string(),
            money_in,
            money_out,
        })
        .collect()
}

fn bucket_by_month(transactions: &[Transaction]) -> Vec<FlowBucket> {
    let mut totals: BTreeMap<u8, (f64, f64)> = (1..=12).map(|month| (month, (0.0, 0.0))).collect();

    for transaction in transactions {
        let month = u8::from(transaction.date.month());
        let (money_in, money_out) = totals.entry(month).or_insert((0.0, 0.0));
        add_to_bucket(transaction, money_in, money_out);
    }

    totals
        .into_iter()
        .map(|(month, (money_in, money_out))| FlowBucket {
            label: MONTH_LABELS[usize::from(month) - 1].to_owned(),
            money_in,
            money_out,
        })
        .collect()
}

fn add_to_bucket(transaction: &Transaction, money_in: &mut f64, money_out: &mut f64) {
    match transaction.kind {
        TransactionKind::Income => *money_in += transaction.amount,
        TransactionKind::Expense => *money_out += transaction.amount,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod bucket_tests {
    use time::{Date, OffsetDateTime, macros::date};

    use crate::transaction::{Transaction, TransactionKind};

    use super::{FlowBucket, Granularity, bucket_transactions};

    fn create_test_transaction(kind: TransactionKind, amount: f64, date: Date) -> Transaction {
        Transaction {
            id: 0,
            user_id: 1,
            wallet_id: Some(1),
            kind,
            amount,
            currency: "NZD".to_owned(),
            merchant: None,
            category: "General".to_owned(),
            description: None,
            date,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    fn zero_bucket(label: &str) -> FlowBucket {
        FlowBucket {
            label: label.to_owned(),
            money_in: 0.0,
            money_out: 0.0,
        }
    }

    #[test]
    fn empty_log_returns_seeded_week_shape() {
        let buckets = bucket_transactions(&[], Granularity::Week);

        let want: Vec<_> = ["1", "2", "3", "4", "5", "6", "7"]
            .into_iter()
            .map(zero_bucket)
            .collect();
        assert_eq!(buckets, want);
    }

    #[test]
    fn empty_log_returns_seeded_month_shape() {
        let buckets = bucket_transactions(&[], Granularity::Month);

        let want: Vec<_> = ["1", "6", "11", "16", "21", "26"]
            .into_iter()
            .map(zero_bucket)
            .collect();
        assert_eq!(buckets, want);
    }

    #[test]
    fn empty_log_returns_seeded_year_shape() {
        let buckets = bucket_transactions(&[], Granularity::Year);

        assert_eq!(buckets.len(), 12);
        let labels: Vec<_> = buckets.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"]
        );
        assert!(buckets.iter().all(|b| b.money_in == 0.0 && b.money_out == 0.0));
    }

    #[test]
    fn unseeded_day_creates_ad_hoc_bucket() {
        let transactions = vec![create_test_transaction(
            TransactionKind::Expense,
            75.0,
            date!(2025 - 08 - 30),
        )];

        let buckets = bucket_transactions(&transactions, Granularity::Month);

        // Six seeded buckets plus the ad-hoc day 30 bucket, in day order.
        let labels: Vec<_> = buckets.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["1", "6", "11", "16", "21", "26", "30"]);
        assert_eq!(buckets[6].money_out, 75.0);
    }

    #[test]
    fn totals_match_signed_sums_per_kind() {
        let transactions = vec![
            create_test_transaction(TransactionKind::Income, 1000.0, date!(2025 - 01 - 03)),
            create_test_transaction(TransactionKind::Income, 250.0, date!(2025 - 04 - 17)),
            create_test_transaction(TransactionKind::Expense, 400.0, date!(2025 - 04 - 17)),
            create_test_transaction(TransactionKind::Expense, 60.0, date!(2025 - 11 - 28)),
        ];

        for granularity in [Granularity::Week, Granularity::Month, Granularity::Year] {
            let buckets = bucket_transactions(&transactions, granularity);

            let money_in: f64 = buckets.iter().map(|b| b.money_in).sum();
            let money_out: f64 = buckets.iter().map(|b| b.money_out).sum();
            assert_eq!(money_in, 1250.0);
            assert_eq!(money_out, 460.0);
        }
    }

    #[test]
    fn year_buckets_are_in_calendar_order_regardless_of_insert_order() {
        let transactions = vec![
            create_test_transaction(TransactionKind::Income, 1.0, date!(2025 - 11 - 01)),
            create_test_transaction(TransactionKind::Income, 2.0, date!(2025 - 02 - 01)),
            create_test_transaction(TransactionKind::Income, 3.0, date!(2025 - 07 - 01)),
        ];

        let buckets = bucket_transactions(&transactions, Granularity::Year);

        let labels: Vec<_> = buckets.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"]
        );
        assert_eq!(buckets[1].money_in, 2.0);
        assert_eq!(buckets[6].money_in, 3.0);
        assert_eq!(buckets[10].money_in, 1.0);
    }

    #[test]
    fn same_day_of_different_months_share_a_day_bucket() {
        let transactions = vec![
            create_test_transaction(TransactionKind::Income, 10.0, date!(2025 - 01 - 06)),
            create_test_transaction(TransactionKind::Income, 5.0, date!(2025 - 03 - 06)),
        ];

        let buckets = bucket_transactions(&transactions, Granularity::Month);

        let bucket = buckets.iter().find(|b| b.label == "6").unwrap();
        assert_eq!(bucket.money_in, 15.0);
    }

    #[test]
    fn income_and_expense_accumulate_independently() {
        let transactions = vec![
            create_test_transaction(TransactionKind::Income, 100.0, date!(2025 - 08 - 02)),
            create_test_transaction(TransactionKind::Expense, 40.0, date!(2025 - 08 - 02)),
        ];

        let buckets = bucket_transactions(&transactions, Granularity::Week);

        let bucket = buckets.iter().find(|b| b.label == "2").unwrap();
        assert_eq!(bucket.money_in, 100.0);
        assert_eq!(bucket.money_out, 40.0);
    }
}
