//! One raw event in, at most one stored transaction out:
//! classify, extract, dedup, categorize, persist.

use std::sync::Arc;

use chrono::DateTime;
use tracing::{debug, trace};

use crate::categorizer::resolve_category_or;
use crate::classifier::classify_event;
use crate::dedup::DedupEngine;
use crate::error::{KharchaError, Result};
use crate::extractor::PatternExtractor;
use crate::models::{RawTextEvent, Transaction, DEFAULT_CATEGORY};
use crate::store::{RuleSource, TransactionStore};

/// What happened to one event. Only `Imported` wrote anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    NotTransaction,
    Unparsed,
    Duplicate,
    /// Passed the in-memory dedup but the id was already stored.
    AlreadyStored(String),
    Imported(Transaction),
}

/// Running counts of pipeline outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub imported: usize,
    pub not_transaction: usize,
    pub unparsed: usize,
    pub duplicates: usize,
    pub already_stored: usize,
    pub failed: usize,
}

impl Tally {
    pub fn record(&mut self, result: &Result<Outcome>) {
        match result {
            Ok(Outcome::Imported(_)) => self.imported += 1,
            Ok(Outcome::NotTransaction) => self.not_transaction += 1,
            Ok(Outcome::Unparsed) => self.unparsed += 1,
            Ok(Outcome::Duplicate) => self.duplicates += 1,
            Ok(Outcome::AlreadyStored(_)) => self.already_stored += 1,
            Err(_) => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.imported
            + self.not_transaction
            + self.unparsed
            + self.duplicates
            + self.already_stored
            + self.failed
    }
}

pub struct Pipeline {
    extractor: PatternExtractor,
    dedup: Arc<DedupEngine>,
    default_category: String,
}

impl Pipeline {
    pub fn new(dedup: Arc<DedupEngine>) -> Result<Self> {
        Ok(Self {
            extractor: PatternExtractor::new()?,
            dedup,
            default_category: DEFAULT_CATEGORY.to_string(),
        })
    }

    /// Category assigned when no keyword rule matches.
    pub fn with_default_category(mut self, category: impl Into<String>) -> Self {
        self.default_category = category.into();
        self
    }

    pub fn dedup(&self) -> &Arc<DedupEngine> {
        &self.dedup
    }

    /// Runs one event through every stage. Soft rejections come back as
    /// [`Outcome`] variants; only store failures are errors.
    pub fn process<S>(&self, event: &RawTextEvent, store: &S) -> Result<Outcome>
    where
        S: TransactionStore + RuleSource,
    {
        if !classify_event(event) {
            trace!(key = %event.event_key, "not transaction-like");
            return Ok(Outcome::NotTransaction);
        }

        let Some(timestamp) = DateTime::from_timestamp_millis(event.timestamp_millis) else {
            debug!(key = %event.event_key, ts = event.timestamp_millis, "timestamp out of range");
            return Ok(Outcome::Unparsed);
        };
        let Some(parsed) = self
            .extractor
            .extract(&event.combined_text(), &event.source_channel, timestamp)
        else {
            debug!(key = %event.event_key, source = %event.source_channel, "no amount or direction found");
            return Ok(Outcome::Unparsed);
        };

        if self.dedup.check_event(event) {
            trace!(key = %event.event_key, "duplicate delivery suppressed");
            return Ok(Outcome::Duplicate);
        }

        let stored = store.keyword_rules().and_then(|rules| {
            let category =
                resolve_category_or(&parsed.categorization_text(), &rules, &self.default_category);
            let txn = parsed.to_transaction(&category);
            let inserted = store.insert_if_absent(&txn)?;
            Ok((txn, inserted))
        });

        match stored {
            Ok((txn, true)) => {
                debug!(id = %txn.id, amount = %txn.amount, category = %txn.category_id, "imported");
                Ok(Outcome::Imported(txn))
            }
            Ok((txn, false)) => {
                trace!(id = %txn.id, "already stored");
                Ok(Outcome::AlreadyStored(txn.id))
            }
            Err(e) => {
                self.dedup.forget_event(event);
                Err(KharchaError::Persist {
                    id: parsed.import_id(),
                    source: Box::new(e),
                })
            }
        }
    }
}
