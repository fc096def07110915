//! Seams between the pipeline and the host: where events come from, where
//! transactions and checkpoints go. `db` implements all of them on SQLite.

use crate::error::Result;
use crate::models::{KeywordRule, RawTextEvent, SyncCheckpoint, Transaction};

/// Persistent transaction store.
pub trait TransactionStore {
    /// Writes `tx` only if no transaction with the same id exists. Returns
    /// whether it was written. This is the durable duplicate guard.
    fn insert_if_absent(&self, tx: &Transaction) -> Result<bool>;

    fn get_transaction(&self, id: &str) -> Result<Option<Transaction>>;

    /// Transactions whose counterparty, title or raw text contains `keyword`
    /// (case-insensitive).
    fn transactions_containing(&self, keyword: &str) -> Result<Vec<Transaction>>;

    fn update_category(&self, id: &str, category_id: &str) -> Result<()>;
}

/// Keyword rules, fetched in bulk before a categorization pass.
pub trait RuleSource {
    fn keyword_rules(&self) -> Result<Vec<KeywordRule>>;
}

/// Small durable state holding one checkpoint per event source.
pub trait CheckpointStore {
    fn load_checkpoint(&self, source: &str) -> Result<SyncCheckpoint>;
    fn save_checkpoint(&self, source: &str, checkpoint: &SyncCheckpoint) -> Result<()>;
    fn clear_checkpoint(&self, source: &str) -> Result<()>;
}

/// One page of a newest-first query against an event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchQuery {
    /// Only events strictly newer than this.
    pub since_millis: Option<i64>,
    pub offset: usize,
    pub limit: usize,
}

/// Source of historical raw events, such as the SMS inbox.
pub trait EventSource {
    /// Returns events sorted newest first. An empty page means the end.
    fn read_batch(&self, query: &BatchQuery) -> Result<Vec<RawTextEvent>>;
}
