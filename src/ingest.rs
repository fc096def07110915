//! Hand-off from event callbacks to a background worker. Callers enqueue
//! and return at once; a single thread drains the channel through the
//! pipeline against its own database connection.

use std::sync::mpsc::{self, Sender};
use std::thread::JoinHandle;

use tracing::{debug, info, warn};

use crate::db::SqliteStore;
use crate::error::{KharchaError, Result};
use crate::models::RawTextEvent;
use crate::pipeline::{Pipeline, Tally};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub received: usize,
    pub tally: Tally,
}

pub struct IngestQueue {
    sender: Option<Sender<RawTextEvent>>,
    worker: Option<JoinHandle<IngestSummary>>,
}

impl IngestQueue {
    /// Starts the worker. `store` moves onto the worker thread.
    pub fn spawn(pipeline: Pipeline, store: SqliteStore) -> Result<Self> {
        let (sender, receiver) = mpsc::channel::<RawTextEvent>();
        let worker = std::thread::Builder::new()
            .name("kharcha-ingest".to_string())
            .spawn(move || {
                let mut summary = IngestSummary::default();
                for event in receiver {
                    summary.received += 1;
                    let result = pipeline.process(&event, &store);
                    match &result {
                        Ok(outcome) => debug!(key = %event.event_key, ?outcome, "event processed"),
                        Err(e) => warn!(key = %event.event_key, error = %e, "failed to process event"),
                    }
                    summary.tally.record(&result);
                }
                summary
            })?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    pub fn submit(&self, event: RawTextEvent) -> Result<()> {
        self.sender
            .as_ref()
            .ok_or_else(|| KharchaError::Other("ingest queue is shut down".to_string()))?
            .send(event)
            .map_err(|_| KharchaError::Other("ingest worker has stopped".to_string()))
    }

    /// Closes the queue, waits for the worker to drain it and returns what
    /// it did.
    pub fn shutdown(mut self) -> Result<IngestSummary> {
        self.sender.take();
        let worker = self
            .worker
            .take()
            .ok_or_else(|| KharchaError::Other("ingest worker already joined".to_string()))?;
        let summary = worker
            .join()
            .map_err(|_| KharchaError::Other("ingest worker panicked".to_string()))?;
        info!(
            received = summary.received,
            imported = summary.tally.imported,
            failed = summary.tally.failed,
            "ingest queue drained"
        );
        Ok(summary)
    }
}

impl Drop for IngestQueue {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
