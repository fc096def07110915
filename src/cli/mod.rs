pub mod add;
pub mod categories;
pub mod export;
pub mod inbox;
pub mod init;
pub mod list;
pub mod listen;
pub mod notify;
pub mod rules;
pub mod status;
pub mod sync;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::db::SqliteStore;
use crate::dedup::{DedupEngine, SystemClock};
use crate::error::{KharchaError, Result};
use crate::pipeline::{Outcome, Pipeline};
use crate::settings::Settings;

/// Opens the configured database. Unlike [`SqliteStore::open`] this refuses
/// to create a fresh one outside `kharcha init`.
pub(crate) fn open_store(settings: &Settings) -> Result<SqliteStore> {
    let db_path = settings.db_path();
    if !db_path.exists() {
        return Err(KharchaError::Other(
            "Database not found. Run `kharcha init` to set up.".to_string(),
        ));
    }
    SqliteStore::open(&db_path)
}

pub(crate) fn build_pipeline(settings: &Settings) -> Result<Pipeline> {
    let dedup = DedupEngine::new(settings.dedup_ttl(), settings.dedup_capacity, SystemClock);
    Ok(Pipeline::new(Arc::new(dedup))?.with_default_category(settings.default_category.clone()))
}

pub(crate) fn describe_outcome(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Imported(txn) => format!(
            "Imported: {} {} [{}]",
            crate::fmt::signed_amount(txn.amount, txn.direction),
            txn.title,
            txn.category_id
        ),
        Outcome::AlreadyStored(id) => format!("Already stored: {id}"),
        Outcome::Duplicate => "Skipped: duplicate delivery".to_string(),
        Outcome::NotTransaction => "Skipped: not a transaction".to_string(),
        Outcome::Unparsed => "Skipped: no amount or direction found".to_string(),
    }
}

#[derive(Parser)]
#[command(
    name = "kharcha",
    about = "Turns bank SMS and payment-app notifications into categorized transactions."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up kharcha: choose a data directory and initialize the database.
    Init {
        /// Path for kharcha data (default: ~/Documents/kharcha)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Run one notification through the pipeline.
    Notify {
        /// Sender id or app package, e.g. VM-HDFCBK
        #[arg(long)]
        source: String,
        /// Platform-assigned notification key or SMS row id
        #[arg(long)]
        key: String,
        /// Notification title
        #[arg(long, default_value = "")]
        title: String,
        /// Event time in epoch milliseconds (default: now)
        #[arg(long)]
        timestamp: Option<i64>,
        /// Message body
        text: String,
    },
    /// Read JSON-lines events from stdin and import them in the background.
    Listen,
    /// Manage the local SMS inbox.
    Inbox {
        #[command(subcommand)]
        command: InboxCommands,
    },
    /// Scan the inbox for transactions added since the last sync.
    Sync {
        /// Forget the checkpoint and rescan the whole inbox
        #[arg(long)]
        full: bool,
        /// Inbox source name
        #[arg(long, default_value = crate::sync::DEFAULT_SOURCE)]
        source: String,
    },
    /// Manage keyword rules.
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
    /// List categories.
    Categories,
    /// Record a transaction by hand.
    Add {
        /// Amount, e.g. 249.50
        #[arg(long)]
        amount: String,
        /// Title shown in listings
        #[arg(long)]
        title: String,
        /// Category ID (see `kharcha categories`)
        #[arg(long, default_value = crate::models::DEFAULT_CATEGORY)]
        category: String,
        /// Record as income instead of expense
        #[arg(long)]
        income: bool,
        /// Free-form note
        #[arg(long, default_value = "")]
        note: String,
    },
    /// Show recent transactions.
    List {
        /// Number of transactions to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Export all transactions to CSV.
    Export {
        /// Output file path
        #[arg(long)]
        output: String,
    },
    /// Show current database and summary statistics.
    Status,
}

#[derive(Subcommand)]
pub enum InboxCommands {
    /// Load a JSON-lines SMS export into the inbox.
    Load {
        /// Path to the JSON-lines file
        file: String,
        /// Inbox source name
        #[arg(long, default_value = crate::sync::DEFAULT_SOURCE)]
        source: String,
    },
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// Add a keyword rule and recategorize matching transactions.
    Add {
        /// Keyword to look for (case-insensitive)
        keyword: String,
        /// Category ID to assign
        #[arg(long)]
        category: String,
        /// Rule priority (higher wins)
        #[arg(long, default_value = "0")]
        priority: i64,
    },
    /// List active keyword rules.
    List,
    /// Delete (deactivate) a rule by ID and recategorize its transactions.
    Delete {
        /// Rule ID (shown in `kharcha rules list`)
        id: i64,
    },
}
