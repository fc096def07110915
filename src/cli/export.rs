use std::path::Path;

use serde::Serialize;

use crate::cli::open_store;
use crate::error::Result;
use crate::models::Transaction;
use crate::settings::load_settings;

#[derive(Serialize)]
struct ExportRow {
    id: String,
    date: String,
    direction: &'static str,
    amount: String,
    title: String,
    category: String,
    counterparty: String,
    origin: &'static str,
    note: String,
}

impl From<Transaction> for ExportRow {
    fn from(txn: Transaction) -> Self {
        Self {
            id: txn.id,
            date: txn.timestamp.to_rfc3339(),
            direction: txn.direction.as_str(),
            amount: txn.amount.to_string(),
            title: txn.title,
            category: txn.category_id,
            counterparty: txn.counterparty.unwrap_or_default(),
            origin: txn.origin.as_str(),
            note: txn.note,
        }
    }
}

pub fn run(output: &str) -> Result<()> {
    let store = open_store(&load_settings())?;
    let transactions = store.all_transactions()?;
    let count = transactions.len();

    if let Some(parent) = Path::new(output).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut writer = csv::Writer::from_path(output)?;
    for txn in transactions {
        writer.serialize(ExportRow::from(txn))?;
    }
    writer.flush()?;

    println!("Exported {count} transactions to {output}");
    Ok(())
}
