use crate::cli::{build_pipeline, open_store};
use crate::error::Result;
use crate::settings::load_settings;
use crate::sync::SyncController;

pub fn run(full: bool, source: &str) -> Result<()> {
    let settings = load_settings();
    let store = open_store(&settings)?;
    let pipeline = build_pipeline(&settings)?;
    let inbox = store.inbox(source);

    let controller = SyncController::new(&pipeline, &store, &inbox)
        .with_source(source)
        .with_batch_size(settings.sync_batch_size);
    if full {
        controller.force_full_resync()?;
    }

    let report = controller.sync()?;
    println!("added {} new transactions from import", report.imported());
    println!(
        "{} scanned ({} scan), {} duplicates, {} not transactions, {} unparsed",
        report.scanned,
        if report.full_scan { "full" } else { "incremental" },
        report.tally.duplicates + report.tally.already_stored,
        report.tally.not_transaction,
        report.tally.unparsed
    );
    if report.tally.failed > 0 {
        println!(
            "{} transactions could not be stored; they will be retried on the next sync",
            report.tally.failed
        );
    }
    Ok(())
}
