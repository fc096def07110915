use std::path::Path;
use std::str::FromStr;

use chrono::DateTime;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};
use rust_decimal::Decimal;

use crate::error::{KharchaError, Result};
use crate::models::{Category, Direction, KeywordRule, OriginKind, RawTextEvent, SyncCheckpoint, Transaction};
use crate::store::{BatchQuery, CheckpointStore, EventSource, RuleSource, TransactionStore};

pub const DB_FILE: &str = "kharcha.db";

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS categories (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    category_type TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS keyword_rules (
    id INTEGER PRIMARY KEY,
    keyword TEXT NOT NULL CHECK (length(trim(keyword)) > 0),
    category_id TEXT NOT NULL,
    priority INTEGER DEFAULT 0,
    is_active INTEGER DEFAULT 1,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (category_id) REFERENCES categories(id)
);

CREATE TABLE IF NOT EXISTS transactions (
    id TEXT PRIMARY KEY,
    amount TEXT NOT NULL,
    title TEXT NOT NULL,
    category_id TEXT NOT NULL,
    timestamp_millis INTEGER NOT NULL,
    note TEXT NOT NULL DEFAULT '',
    origin TEXT NOT NULL,
    raw_text TEXT,
    counterparty TEXT,
    direction TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS raw_events (
    row_id INTEGER PRIMARY KEY,
    source TEXT NOT NULL,
    event_key TEXT NOT NULL,
    source_channel TEXT NOT NULL,
    title TEXT NOT NULL DEFAULT '',
    body TEXT NOT NULL,
    timestamp_millis INTEGER NOT NULL,
    loaded_at TEXT DEFAULT (datetime('now')),
    UNIQUE (source, source_channel, event_key)
);

CREATE INDEX IF NOT EXISTS idx_raw_events_ts ON raw_events (source, timestamp_millis);

CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

// (id, name, category_type)
const DEFAULT_CATEGORIES: &[(&str, &str, &str)] = &[
    ("food", "Food & Dining", "expense"),
    ("groceries", "Groceries", "expense"),
    ("shopping", "Shopping", "expense"),
    ("transport", "Transport", "expense"),
    ("travel", "Travel", "expense"),
    ("bills", "Bills & Recharges", "expense"),
    ("entertainment", "Entertainment", "expense"),
    ("health", "Health", "expense"),
    ("rent", "Rent", "expense"),
    ("transfers", "Transfers", "expense"),
    ("salary", "Salary", "income"),
    ("refunds", "Refunds", "income"),
    ("other", "Other", "expense"),
];

// (keyword, category_id, priority)
const DEFAULT_RULES: &[(&str, &str, i64)] = &[
    ("salary", "salary", 20),
    ("refund", "refunds", 15),
    ("swiggy", "food", 10),
    ("zomato", "food", 10),
    ("blinkit", "groceries", 10),
    ("zepto", "groceries", 10),
    ("bigbasket", "groceries", 10),
    ("dmart", "groceries", 10),
    ("amazon", "shopping", 5),
    ("flipkart", "shopping", 5),
    ("myntra", "shopping", 5),
    ("ajio", "shopping", 5),
    ("uber", "transport", 5),
    ("olacabs", "transport", 5),
    ("rapido", "transport", 5),
    ("irctc", "travel", 5),
    ("makemytrip", "travel", 5),
    ("indigo", "travel", 5),
    ("airtel", "bills", 5),
    ("jio", "bills", 5),
    ("recharge", "bills", 3),
    ("electricity", "bills", 3),
    ("netflix", "entertainment", 5),
    ("spotify", "entertainment", 5),
    ("hotstar", "entertainment", 5),
    ("bookmyshow", "entertainment", 5),
    ("apollo", "health", 5),
    ("pharmeasy", "health", 5),
    ("house rent", "rent", 5),
];

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;

    let count: i64 = conn.query_row("SELECT count(*) FROM categories", [], |row| row.get(0))?;
    if count == 0 {
        for (id, name, category_type) in DEFAULT_CATEGORIES {
            conn.execute(
                "INSERT INTO categories (id, name, category_type) VALUES (?1, ?2, ?3)",
                rusqlite::params![id, name, category_type],
            )?;
        }
        for (keyword, category_id, priority) in DEFAULT_RULES {
            conn.execute(
                "INSERT INTO keyword_rules (keyword, category_id, priority) VALUES (?1, ?2, ?3)",
                rusqlite::params![keyword, category_id, priority],
            )?;
        }
    }
    Ok(())
}

pub fn get_metadata(conn: &Connection, key: &str) -> Option<String> {
    conn.query_row("SELECT value FROM metadata WHERE key = ?1", [key], |r| r.get(0))
        .ok()
}

pub fn set_metadata(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO metadata (key, value) VALUES (?1, ?2) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        [key, value],
    )?;
    Ok(())
}

fn conversion_error(idx: usize, err: KharchaError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

const TRANSACTION_COLUMNS: &str =
    "id, amount, title, category_id, timestamp_millis, note, origin, raw_text, counterparty, direction";

fn row_to_transaction(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let amount: String = row.get(1)?;
    let amount = Decimal::from_str(&amount)
        .map_err(|_| conversion_error(1, KharchaError::InvalidAmount(amount.clone())))?;
    let millis: i64 = row.get(4)?;
    let timestamp = DateTime::from_timestamp_millis(millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(4, millis))?;
    let origin: String = row.get(6)?;
    let direction: String = row.get(9)?;

    Ok(Transaction {
        id: row.get(0)?,
        amount,
        title: row.get(2)?,
        category_id: row.get(3)?,
        timestamp,
        note: row.get(5)?,
        origin: OriginKind::from_str(&origin).map_err(|e| conversion_error(6, e))?,
        raw_text: row.get(7)?,
        counterparty: row.get(8)?,
        direction: Direction::from_str(&direction).map_err(|e| conversion_error(9, e))?,
    })
}

/// SQLite-backed implementation of every store seam.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Opens (creating if needed) and initializes the database at `db_path`.
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = get_connection(db_path)?;
        init_db(&conn)?;
        Ok(Self::new(conn))
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn list_transactions(&self, limit: usize) -> Result<Vec<Transaction>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions ORDER BY timestamp_millis DESC, id LIMIT ?1"
        ))?;
        let rows = stmt
            .query_map([limit as i64], row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn all_transactions(&self) -> Result<Vec<Transaction>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions ORDER BY timestamp_millis, id"
        ))?;
        let rows = stmt
            .query_map([], row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn count_transactions(&self) -> Result<i64> {
        Ok(self.conn.query_row("SELECT count(*) FROM transactions", [], |r| r.get(0))?)
    }

    pub fn list_categories(&self) -> Result<Vec<Category>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, category_type FROM categories ORDER BY category_type, name")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Category {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    category_type: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn category_exists(&self, id: &str) -> Result<bool> {
        let mut stmt = self.conn.prepare_cached("SELECT 1 FROM categories WHERE id = ?1")?;
        Ok(stmt.exists([id])?)
    }

    pub fn add_rule(&self, rule: &KeywordRule) -> Result<i64> {
        if !self.category_exists(&rule.category_id)? {
            return Err(KharchaError::UnknownCategory(rule.category_id.clone()));
        }
        self.conn.execute(
            "INSERT INTO keyword_rules (keyword, category_id, priority) VALUES (?1, ?2, ?3)",
            rusqlite::params![rule.keyword.trim(), rule.category_id, rule.priority],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Deactivates a rule and returns it so the caller can recategorize
    /// transactions mentioning its keyword.
    pub fn delete_rule(&self, id: i64) -> Result<KeywordRule> {
        let rule = self
            .conn
            .query_row(
                "SELECT id, keyword, category_id, priority FROM keyword_rules \
                 WHERE id = ?1 AND is_active = 1",
                [id],
                |row| {
                    Ok(KeywordRule {
                        id: Some(row.get(0)?),
                        keyword: row.get(1)?,
                        category_id: row.get(2)?,
                        priority: row.get(3)?,
                    })
                },
            )
            .optional()?
            .ok_or(KharchaError::UnknownRule(id))?;
        self.conn
            .execute("UPDATE keyword_rules SET is_active = 0 WHERE id = ?1", [id])?;
        Ok(rule)
    }

    /// Adds a manually entered transaction.
    pub fn insert_transaction(&self, tx: &Transaction) -> Result<()> {
        if !self.insert_if_absent(tx)? {
            return Err(KharchaError::Other(format!("Transaction {} already exists", tx.id)));
        }
        Ok(())
    }

    /// Stores a raw event in the local inbox. Returns false if the same
    /// event was loaded before.
    pub fn add_raw_event(&self, source: &str, event: &RawTextEvent) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO raw_events (source, event_key, source_channel, title, body, timestamp_millis) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                source,
                event.event_key,
                event.source_channel,
                event.title,
                event.text,
                event.timestamp_millis,
            ],
        )?;
        Ok(inserted > 0)
    }

    pub fn count_raw_events(&self, source: &str) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT count(*) FROM raw_events WHERE source = ?1",
            [source],
            |r| r.get(0),
        )?)
    }

    /// The inbox rows of one source, readable as an [`EventSource`].
    pub fn inbox<'a>(&'a self, source: &'a str) -> Inbox<'a> {
        Inbox { store: self, source }
    }
}

impl TransactionStore for SqliteStore {
    fn insert_if_absent(&self, tx: &Transaction) -> Result<bool> {
        let inserted = self.conn.execute(
            &format!(
                "INSERT OR IGNORE INTO transactions ({TRANSACTION_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
            ),
            rusqlite::params![
                tx.id,
                tx.amount.to_string(),
                tx.title,
                tx.category_id,
                tx.timestamp.timestamp_millis(),
                tx.note,
                tx.origin.as_str(),
                tx.raw_text,
                tx.counterparty,
                tx.direction.as_str(),
            ],
        )?;
        Ok(inserted > 0)
    }

    fn get_transaction(&self, id: &str) -> Result<Option<Transaction>> {
        let txn = self
            .conn
            .query_row(
                &format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?1"),
                [id],
                row_to_transaction,
            )
            .optional()?;
        Ok(txn)
    }

    fn transactions_containing(&self, keyword: &str) -> Result<Vec<Transaction>> {
        // SQLite's lower() only folds ASCII, so matching happens here with the
        // same folding the categorizer uses.
        let needle = keyword.trim().to_lowercase();
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {TRANSACTION_COLUMNS} FROM transactions"))?;
        let rows = stmt
            .query_map([], row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows
            .into_iter()
            .filter(|txn| txn.categorization_text().to_lowercase().contains(&needle))
            .collect())
    }

    fn update_category(&self, id: &str, category_id: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE transactions SET category_id = ?1 WHERE id = ?2",
            [category_id, id],
        )?;
        Ok(())
    }
}

impl RuleSource for SqliteStore {
    /// Active rules in creation order, so equal priorities resolve to the
    /// oldest rule.
    fn keyword_rules(&self) -> Result<Vec<KeywordRule>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, keyword, category_id, priority FROM keyword_rules \
             WHERE is_active = 1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(KeywordRule {
                    id: Some(row.get(0)?),
                    keyword: row.get(1)?,
                    category_id: row.get(2)?,
                    priority: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn checkpoint_keys(source: &str) -> (String, String) {
    (
        format!("sync.{source}.initial_done"),
        format!("sync.{source}.last_timestamp_millis"),
    )
}

impl CheckpointStore for SqliteStore {
    fn load_checkpoint(&self, source: &str) -> Result<SyncCheckpoint> {
        let (done_key, ts_key) = checkpoint_keys(source);
        let initial_sync_done = get_metadata(&self.conn, &done_key).as_deref() == Some("1");
        let last_sync_timestamp_millis = get_metadata(&self.conn, &ts_key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        Ok(SyncCheckpoint {
            initial_sync_done,
            last_sync_timestamp_millis,
        })
    }

    fn save_checkpoint(&self, source: &str, checkpoint: &SyncCheckpoint) -> Result<()> {
        let (done_key, ts_key) = checkpoint_keys(source);
        let tx = self.conn.unchecked_transaction()?;
        set_metadata(&tx, &done_key, if checkpoint.initial_sync_done { "1" } else { "0" })?;
        set_metadata(&tx, &ts_key, &checkpoint.last_sync_timestamp_millis.to_string())?;
        tx.commit()?;
        Ok(())
    }

    fn clear_checkpoint(&self, source: &str) -> Result<()> {
        let (done_key, ts_key) = checkpoint_keys(source);
        self.conn.execute(
            "DELETE FROM metadata WHERE key IN (?1, ?2)",
            [done_key, ts_key],
        )?;
        Ok(())
    }
}

pub struct Inbox<'a> {
    store: &'a SqliteStore,
    source: &'a str,
}

impl EventSource for Inbox<'_> {
    fn read_batch(&self, query: &BatchQuery) -> Result<Vec<RawTextEvent>> {
        let mut stmt = self.store.conn.prepare_cached(
            "SELECT event_key, source_channel, title, body, timestamp_millis FROM raw_events \
             WHERE source = ?1 AND timestamp_millis > ?2 \
             ORDER BY timestamp_millis DESC, row_id DESC LIMIT ?3 OFFSET ?4",
        )?;
        let since = query.since_millis.unwrap_or(i64::MIN);
        let rows = stmt
            .query_map(
                rusqlite::params![self.source, since, query.limit as i64, query.offset as i64],
                |row| {
                    Ok(RawTextEvent {
                        event_key: row.get(0)?,
                        source_channel: row.get(1)?,
                        title: row.get(2)?,
                        text: row.get(3)?,
                        timestamp_millis: row.get(4)?,
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("test.db")).unwrap();
        (dir, store)
    }

    fn event(key: &str, ts: i64) -> RawTextEvent {
        RawTextEvent {
            title: String::new(),
            text: format!("Rs {ts} debited"),
            timestamp_millis: ts,
            source_channel: "VM-HDFCBK".to_string(),
            event_key: key.to_string(),
        }
    }

    fn sample_txn(id: &str) -> Transaction {
        Transaction {
            id: id.to_string(),
            amount: Decimal::from_str("1234.50").unwrap(),
            title: "Swiggy".to_string(),
            category_id: "food".to_string(),
            timestamp: DateTime::from_timestamp_millis(1_704_441_600_123).unwrap(),
            note: "Imported from HDFC Bank".to_string(),
            origin: OriginKind::AutomatedImport,
            raw_text: Some("You paid ₹1,234.50 to Swiggy".to_string()),
            counterparty: Some("Swiggy".to_string()),
            direction: Direction::Expense,
        }
    }

    #[test]
    fn test_init_db_creates_tables() {
        let (_dir, store) = test_store();
        let tables: Vec<String> = store
            .conn()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        for expected in &["categories", "keyword_rules", "transactions", "raw_events", "metadata"] {
            assert!(tables.contains(&expected.to_string()), "missing table: {expected}");
        }
    }

    #[test]
    fn test_init_db_is_idempotent() {
        let (_dir, store) = test_store();
        init_db(store.conn()).unwrap();
        let rules = store.keyword_rules().unwrap();
        assert_eq!(rules.len(), DEFAULT_RULES.len());
    }

    #[test]
    fn test_default_rules_point_at_seeded_categories() {
        let (_dir, store) = test_store();
        for rule in store.keyword_rules().unwrap() {
            assert!(store.category_exists(&rule.category_id).unwrap(), "{}", rule.category_id);
        }
        assert!(store.category_exists(crate::models::DEFAULT_CATEGORY).unwrap());
    }

    #[test]
    fn test_transaction_roundtrip() {
        let (_dir, store) = test_store();
        let txn = sample_txn("auto-1");
        assert!(store.insert_if_absent(&txn).unwrap());
        let loaded = store.get_transaction("auto-1").unwrap().unwrap();
        assert_eq!(loaded, txn);
        assert_eq!(loaded.amount.to_string(), "1234.50");
    }

    #[test]
    fn test_insert_if_absent_keeps_first() {
        let (_dir, store) = test_store();
        let first = sample_txn("auto-1");
        let mut second = sample_txn("auto-1");
        second.title = "Changed".to_string();
        assert!(store.insert_if_absent(&first).unwrap());
        assert!(!store.insert_if_absent(&second).unwrap());
        assert_eq!(store.get_transaction("auto-1").unwrap().unwrap().title, "Swiggy");
        assert_eq!(store.count_transactions().unwrap(), 1);
    }

    #[test]
    fn test_transactions_containing_is_case_insensitive() {
        let (_dir, store) = test_store();
        store.insert_if_absent(&sample_txn("a")).unwrap();
        assert_eq!(store.transactions_containing("SWIGGY").unwrap().len(), 1);
        assert_eq!(store.transactions_containing("zomato").unwrap().len(), 0);
    }

    #[test]
    fn test_transactions_containing_folds_non_ascii() {
        let (_dir, store) = test_store();
        let mut txn = sample_txn("cafe");
        txn.title = "CAFÉ MOCHA".to_string();
        txn.counterparty = Some("CAFÉ MOCHA".to_string());
        txn.raw_text = Some("You paid ₹180 to CAFÉ MOCHA".to_string());
        store.insert_if_absent(&txn).unwrap();
        let found = store.transactions_containing("Café").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "cafe");
    }

    #[test]
    fn test_add_rule_rejects_unknown_category() {
        let (_dir, store) = test_store();
        let err = store.add_rule(&KeywordRule::new("x", "nope", 0)).unwrap_err();
        assert!(matches!(err, KharchaError::UnknownCategory(_)));
    }

    #[test]
    fn test_delete_rule_twice() {
        let (_dir, store) = test_store();
        let id = store.add_rule(&KeywordRule::new("chai", "food", 1)).unwrap();
        assert_eq!(store.delete_rule(id).unwrap().keyword, "chai");
        assert!(matches!(store.delete_rule(id), Err(KharchaError::UnknownRule(_))));
    }

    #[test]
    fn test_checkpoint_roundtrip_and_clear() {
        let (_dir, store) = test_store();
        assert_eq!(store.load_checkpoint("sms").unwrap(), SyncCheckpoint::default());
        let cp = SyncCheckpoint {
            initial_sync_done: true,
            last_sync_timestamp_millis: 1_700_000_000_000,
        };
        store.save_checkpoint("sms", &cp).unwrap();
        assert_eq!(store.load_checkpoint("sms").unwrap(), cp);
        assert_eq!(store.load_checkpoint("other").unwrap(), SyncCheckpoint::default());
        store.clear_checkpoint("sms").unwrap();
        assert_eq!(store.load_checkpoint("sms").unwrap(), SyncCheckpoint::default());
    }

    #[test]
    fn test_inbox_paging_newest_first() {
        let (_dir, store) = test_store();
        for (i, ts) in [100, 300, 200].iter().enumerate() {
            assert!(store.add_raw_event("sms", &event(&i.to_string(), *ts)).unwrap());
        }
        assert!(!store.add_raw_event("sms", &event("0", 100)).unwrap());

        let inbox = store.inbox("sms");
        let page = inbox
            .read_batch(&BatchQuery { since_millis: None, offset: 0, limit: 2 })
            .unwrap();
        assert_eq!(page.iter().map(|e| e.timestamp_millis).collect::<Vec<_>>(), vec![300, 200]);
        let page = inbox
            .read_batch(&BatchQuery { since_millis: None, offset: 2, limit: 2 })
            .unwrap();
        assert_eq!(page.len(), 1);

        let newer = inbox
            .read_batch(&BatchQuery { since_millis: Some(200), offset: 0, limit: 10 })
            .unwrap();
        assert_eq!(newer.len(), 1);
        assert_eq!(newer[0].timestamp_millis, 300);
    }
}
