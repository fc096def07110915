use chrono::Utc;
use rand::Rng;

use crate::cli::open_store;
use crate::error::{KharchaError, Result};
use crate::extractor::parse_amount;
use crate::fmt::signed_amount;
use crate::models::{Direction, OriginKind, Transaction};
use crate::settings::load_settings;

pub fn run(amount: &str, title: &str, category: &str, income: bool, note: &str) -> Result<()> {
    let amount = parse_amount(amount).ok_or_else(|| KharchaError::InvalidAmount(amount.to_string()))?;
    if title.trim().is_empty() {
        return Err(KharchaError::Other("Title is required".into()));
    }
    let store = open_store(&load_settings())?;
    if !store.category_exists(category)? {
        return Err(KharchaError::UnknownCategory(category.to_string()));
    }

    let direction = if income { Direction::Income } else { Direction::Expense };
    let txn = Transaction {
        id: format!("manual-{:016x}", rand::thread_rng().gen::<u64>()),
        amount,
        title: title.trim().to_string(),
        category_id: category.to_string(),
        timestamp: Utc::now(),
        note: note.to_string(),
        origin: OriginKind::Manual,
        raw_text: None,
        counterparty: None,
        direction,
    };
    store.insert_transaction(&txn)?;

    println!(
        "Added {}: {} [{}]",
        txn.id,
        signed_amount(txn.amount, txn.direction),
        txn.category_id
    );
    Ok(())
}
