use std::io::BufRead;

use crate::cli::open_store;
use crate::error::{KharchaError, Result};
use crate::models::RawTextEvent;
use crate::settings::load_settings;

pub fn load(file: &str, source: &str) -> Result<()> {
    let store = open_store(&load_settings())?;
    let reader = std::io::BufReader::new(std::fs::File::open(file)?);

    let tx = store.conn().unchecked_transaction()?;
    let (mut added, mut skipped) = (0usize, 0usize);
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event: RawTextEvent = serde_json::from_str(&line)
            .map_err(|e| KharchaError::Other(format!("{file}:{}: {e}", n + 1)))?;
        if store.add_raw_event(source, &event)? {
            added += 1;
        } else {
            skipped += 1;
        }
    }
    tx.commit()?;

    println!("{added} loaded, {skipped} skipped (already in inbox)");
    Ok(())
}
