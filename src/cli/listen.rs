use std::io::BufRead;

use tracing::warn;

use crate::cli::{build_pipeline, open_store};
use crate::error::Result;
use crate::ingest::IngestQueue;
use crate::models::RawTextEvent;
use crate::settings::load_settings;

pub fn run() -> Result<()> {
    let settings = load_settings();
    let queue = IngestQueue::spawn(build_pipeline(&settings)?, open_store(&settings)?)?;

    let mut malformed = 0usize;
    for (n, line) in std::io::stdin().lock().lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<RawTextEvent>(&line) {
            Ok(event) => queue.submit(event)?,
            Err(e) => {
                warn!(line = n + 1, error = %e, "skipping malformed event");
                malformed += 1;
            }
        }
    }

    let summary = queue.shutdown()?;
    println!("added {} new transactions from import", summary.tally.imported);
    println!(
        "{} received, {} duplicates, {} not transactions, {} unparsed, {} failed, {} malformed",
        summary.received,
        summary.tally.duplicates + summary.tally.already_stored,
        summary.tally.not_transaction,
        summary.tally.unparsed,
        summary.tally.failed,
        malformed
    );
    Ok(())
}
