//! Incremental scanning of a historical event source.
//!
//! The first pass reads everything the source has, in fixed-size pages.
//! Later passes only ask for events strictly newer than the checkpoint.
//! The checkpoint only moves when a pass completes with no failures, so a
//! failed window is scanned again next time; the durable id guard keeps
//! that retry from storing anything twice.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::dedup::{Clock, SystemClock};
use crate::error::{KharchaError, Result};
use crate::models::SyncCheckpoint;
use crate::pipeline::{Pipeline, Tally};
use crate::store::{BatchQuery, CheckpointStore, EventSource, RuleSource, TransactionStore};

pub const DEFAULT_BATCH_SIZE: usize = 500;
pub const DEFAULT_SOURCE: &str = "sms";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    NeverSynced,
    Synced { last_sync_timestamp_millis: i64 },
}

impl From<SyncCheckpoint> for SyncState {
    fn from(cp: SyncCheckpoint) -> Self {
        if cp.initial_sync_done {
            SyncState::Synced {
                last_sync_timestamp_millis: cp.last_sync_timestamp_millis,
            }
        } else {
            SyncState::NeverSynced
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub full_scan: bool,
    pub scanned: usize,
    pub tally: Tally,
    pub checkpoint_advanced: bool,
    pub cancelled: bool,
}

impl SyncReport {
    pub fn imported(&self) -> usize {
        self.tally.imported
    }
}

pub struct SyncController<'a, S, E> {
    pipeline: &'a Pipeline,
    store: &'a S,
    events: &'a E,
    source: String,
    batch_size: usize,
    clock: Box<dyn Clock>,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a, S, E> SyncController<'a, S, E>
where
    S: TransactionStore + RuleSource + CheckpointStore,
    E: EventSource,
{
    pub fn new(pipeline: &'a Pipeline, store: &'a S, events: &'a E) -> Self {
        Self {
            pipeline,
            store,
            events,
            source: DEFAULT_SOURCE.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            clock: Box::new(SystemClock),
            cancel: None,
        }
    }

    /// Name the checkpoint is stored under.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Setting the flag stops the pass before its next page.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn state(&self) -> Result<SyncState> {
        Ok(self.store.load_checkpoint(&self.source)?.into())
    }

    /// Back to `NeverSynced`: the next pass rescans the full history.
    pub fn force_full_resync(&self) -> Result<()> {
        self.store.clear_checkpoint(&self.source)?;
        info!(source = %self.source, "checkpoint cleared, next sync is a full scan");
        Ok(())
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Runs one pass. A page that cannot be read aborts the pass with
    /// [`KharchaError::BatchRead`]; failures on single events are counted
    /// and the pass carries on.
    pub fn sync(&self) -> Result<SyncReport> {
        let since = match self.state()? {
            SyncState::NeverSynced => None,
            SyncState::Synced {
                last_sync_timestamp_millis,
            } => Some(last_sync_timestamp_millis),
        };
        // Taken before reading so events arriving mid-pass land in the next window.
        let started_at = self.clock.now_millis();
        let mut report = SyncReport {
            full_scan: since.is_none(),
            ..SyncReport::default()
        };
        info!(source = %self.source, full = report.full_scan, since = ?since, "sync started");

        let mut offset = 0usize;
        loop {
            if self.is_cancelled() {
                report.cancelled = true;
                info!(source = %self.source, scanned = report.scanned, "sync cancelled");
                return Ok(report);
            }

            let query = BatchQuery {
                since_millis: since,
                offset,
                limit: self.batch_size,
            };
            let batch = self.events.read_batch(&query).map_err(|e| {
                error!(source = %self.source, offset, error = %e, "failed to read batch");
                KharchaError::BatchRead {
                    offset,
                    source: Box::new(e),
                }
            })?;
            if batch.is_empty() {
                break;
            }

            for event in &batch {
                report.scanned += 1;
                let result = self.pipeline.process(event, self.store);
                if let Err(e) = &result {
                    warn!(key = %event.event_key, error = %e, "failed to process event");
                }
                report.tally.record(&result);
            }
            offset += batch.len();
        }

        if report.tally.failed > 0 {
            warn!(
                source = %self.source,
                failed = report.tally.failed,
                "checkpoint not advanced, window will be rescanned"
            );
        } else {
            let checkpoint = SyncCheckpoint {
                initial_sync_done: true,
                last_sync_timestamp_millis: started_at,
            };
            self.store.save_checkpoint(&self.source, &checkpoint)?;
            report.checkpoint_advanced = true;
        }

        info!(
            source = %self.source,
            scanned = report.scanned,
            imported = report.tally.imported,
            duplicates = report.tally.duplicates + report.tally.already_stored,
            failed = report.tally.failed,
            "sync finished"
        );
        Ok(report)
    }
}
