use chrono::Local;
use comfy_table::{Cell, CellAlignment, Table};

use crate::cli::open_store;
use crate::error::Result;
use crate::fmt::signed_amount;
use crate::settings::load_settings;

pub fn run(limit: usize) -> Result<()> {
    let store = open_store(&load_settings())?;
    let transactions = store.list_transactions(limit)?;

    if transactions.is_empty() {
        println!("No transactions yet.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Date", "Amount", "Title", "Category", "Origin"]);
    for txn in transactions {
        table.add_row(vec![
            Cell::new(txn.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M")),
            Cell::new(signed_amount(txn.amount, txn.direction)).set_alignment(CellAlignment::Right),
            Cell::new(txn.title),
            Cell::new(txn.category_id),
            Cell::new(txn.origin.as_str()),
        ]);
    }
    println!("Transactions\n{table}");
    Ok(())
}
