//! Seeds a ledger with a handful of events and prints the displayed balance
//! and flow series, exercising the write protocol, change feed, balance
//! materializer, and flow aggregator end to end.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

use clap::Parser;
use rusqlite::Connection;
use tracing_subscriber::EnvFilter;

use ledgerly::{
    Granularity, LedgerEvent, LedgerService, SqliteLedgerStore, TransactionKind, initialize,
    next_refresh,
};

/// A demo session against the wallet ledger subsystem.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to a SQLite database. Uses an in-memory database when
    /// omitted.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// The user to run the session as.
    #[arg(long, default_value_t = 1)]
    user: i64,
}

#[tokio::main]
async fn main() {
    setup_logging();

    let args = Args::parse();

    let connection = match &args.db_path {
        Some(path) => Connection::open(path),
        None => Connection::open_in_memory(),
    }
    .expect("Could not open the database");
    initialize(&connection).expect("Could not initialise the database");

    let store = SqliteLedgerStore::new(Arc::new(Mutex::new(connection)));
    let service = LedgerService::with_debounce(store, Duration::from_millis(100));

    let feed = service.subscribe_to_changes(args.user);
    let mut refreshes = feed.on_refresh();

    let events = [
        (TransactionKind::Income, 2500.0, "Salary", "Acme Corp"),
        (TransactionKind::Expense, 132.40, "Groceries", "Countdown"),
        (TransactionKind::Expense, 64.95, "Transport", "Metro Card"),
        (TransactionKind::Income, 120.0, "Side Gig", "Gumroad"),
    ];
    for (kind, amount, category, merchant) in events {
        let receipt = service
            .apply_ledger_event(
                LedgerEvent::new(args.user, kind, amount)
                    .category(category)
                    .merchant(merchant),
            )
            .await
            .expect("Could not apply ledger event");
        tracing::info!(
            "applied {} of {:.2}, balance now {:.2}",
            receipt.transaction.kind.as_str(),
            receipt.transaction.amount,
            receipt.new_balance
        );
    }

    match next_refresh(&mut refreshes, Duration::from_secs(2)).await {
        Some(refresh) => tracing::info!("change feed signalled {refresh:?}"),
        None => tracing::warn!("no refresh signal arrived"),
    }

    let balance = service.display_balance(args.user).await;
    println!("Balance: {:.2} {}", balance.amount, balance.currency);

    for granularity in [Granularity::Week, Granularity::Month, Granularity::Year] {
        let series = service
            .flow_series(args.user, granularity)
            .await
            .expect("Could not aggregate the flow series");
        println!(
            "{granularity:?}: {}",
            serde_json::to_string_pretty(&series).expect("Could not serialize the flow series")
        );
    }

    feed.close();
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}
