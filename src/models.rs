use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::dedup::content_hash;
use crate::error::KharchaError;

/// Category assigned when no keyword rule matches.
pub const DEFAULT_CATEGORY: &str = "other";

/// One piece of raw text handed over by the host: a notification or an SMS row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTextEvent {
    /// Notification title. SMS rows have none.
    #[serde(default)]
    pub title: String,
    pub text: String,
    pub timestamp_millis: i64,
    /// App package or SMS sender id.
    pub source_channel: String,
    /// Platform-assigned id (notification key, SMS row id).
    pub event_key: String,
}

impl RawTextEvent {
    /// Title and body joined the way the extractor sees them.
    pub fn combined_text(&self) -> String {
        let title = self.title.trim();
        let body = self.text.trim();
        if title.is_empty() {
            body.to_string()
        } else if body.is_empty() {
            title.to_string()
        } else {
            format!("{title} {body}")
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Expense,
    Income,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expense => "expense",
            Self::Income => "income",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = KharchaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "expense" => Ok(Self::Expense),
            "income" => Ok(Self::Income),
            other => Err(KharchaError::Other(format!("Unknown direction: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginKind {
    Manual,
    AutomatedImport,
}

impl OriginKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::AutomatedImport => "automated_import",
        }
    }
}

impl FromStr for OriginKind {
    type Err = KharchaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Self::Manual),
            "automated_import" => Ok(Self::AutomatedImport),
            other => Err(KharchaError::Other(format!("Unknown origin: {other}"))),
        }
    }
}

/// What the extractor pulled out of one message. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTransaction {
    pub amount: Decimal,
    pub direction: Direction,
    pub counterparty: Option<String>,
    /// Last digits of the account or card, when the message names one.
    pub account_suffix: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub raw_text: String,
    /// Human bank/app name.
    pub source_label: Option<String>,
    pub source_channel: String,
}

impl ParsedTransaction {
    /// Stable id for the stored record. Reprocessing the same message yields
    /// the same id, so the store's id check rejects the second copy.
    pub fn import_id(&self) -> String {
        let secs = self.timestamp.timestamp_millis().div_euclid(1000).to_string();
        let hash = content_hash(&[&self.source_channel, &self.raw_text, &secs]);
        format!("auto-{}", &hash[..20])
    }

    /// Text the categorizer matches keywords against.
    pub fn categorization_text(&self) -> String {
        match &self.counterparty {
            Some(party) => format!("{party} {}", self.raw_text),
            None => self.raw_text.clone(),
        }
    }

    pub fn to_transaction(&self, category_id: &str) -> Transaction {
        let label = self.source_label.as_deref().unwrap_or("Bank/UPI");
        let title = match (&self.counterparty, self.direction) {
            (Some(party), _) => party.clone(),
            (None, Direction::Expense) => format!("{label} payment"),
            (None, Direction::Income) => format!("{label} credit"),
        };
        let note = match &self.account_suffix {
            Some(suffix) => format!("Imported from {label} (a/c ..{suffix})"),
            None => format!("Imported from {label}"),
        };
        Transaction {
            id: self.import_id(),
            amount: self.amount,
            title,
            category_id: category_id.to_string(),
            timestamp: self.timestamp,
            note,
            origin: OriginKind::AutomatedImport,
            raw_text: Some(self.raw_text.clone()),
            counterparty: self.counterparty.clone(),
            direction: self.direction,
        }
    }
}

/// A stored transaction, entered by hand or produced by the import pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub id: String,
    pub amount: Decimal,
    pub title: String,
    pub category_id: String,
    pub timestamp: DateTime<Utc>,
    pub note: String,
    pub origin: OriginKind,
    pub raw_text: Option<String>,
    pub counterparty: Option<String>,
    pub direction: Direction,
}

impl Transaction {
    pub fn categorization_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(3);
        if let Some(party) = &self.counterparty {
            parts.push(party);
        }
        parts.push(&self.title);
        if let Some(raw) = &self.raw_text {
            parts.push(raw);
        }
        parts.join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    #[serde(default)]
    pub id: Option<i64>,
    pub keyword: String,
    pub category_id: String,
    #[serde(default)]
    pub priority: i64,
}

impl KeywordRule {
    pub fn new(keyword: impl Into<String>, category_id: impl Into<String>, priority: i64) -> Self {
        Self {
            id: None,
            keyword: keyword.into(),
            category_id: category_id.into(),
            priority,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub category_type: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCheckpoint {
    pub initial_sync_done: bool,
    pub last_sync_timestamp_millis: i64,
}
