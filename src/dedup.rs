//! In-memory suppression of repeated deliveries of the same event.
//!
//! Notifications get re-posted when the OS updates them, and the same payment
//! can arrive as a notification and an SMS broadcast a moment apart. The engine
//! remembers recently seen keys for a short TTL. It is best effort: the map
//! lives in memory only, and the store's id check is the durable guard.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::trace;

use crate::models::RawTextEvent;

pub const DEFAULT_TTL: Duration = Duration::from_secs(120);
pub const DEFAULT_CAPACITY: usize = 400;

/// Length of the fingerprint prefix kept in dedup keys.
const FINGERPRINT_LEN: usize = 16;

pub fn content_hash(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        // separator so ("ab", "c") and ("a", "bc") differ
        hasher.update([0x1f]);
    }
    hex::encode(hasher.finalize())
}

/// Short content hash of an event. The timestamp is bucketed to the second so
/// sub-second redelivery jitter hashes the same.
pub fn fingerprint(source_channel: &str, title: &str, body: &str, timestamp_millis: i64) -> String {
    let bucket = timestamp_millis.div_euclid(1000).to_string();
    let hash = content_hash(&[source_channel, title, body, &bucket]);
    hash[..FINGERPRINT_LEN].to_string()
}

pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(start_millis),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }

    pub fn set(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now_millis(&self) -> i64 {
        (**self).now_millis()
    }
}

fn event_key(event: &RawTextEvent) -> String {
    format!("key:{}:{}", event.source_channel, event.event_key)
}

pub struct DedupEngine {
    seen: Mutex<HashMap<String, i64>>,
    ttl_millis: i64,
    capacity: usize,
    clock: Box<dyn Clock>,
}

impl DedupEngine {
    pub fn new(ttl: Duration, capacity: usize, clock: impl Clock + 'static) -> Self {
        Self {
            seen: Mutex::new(HashMap::new()),
            ttl_millis: ttl.as_millis() as i64,
            capacity,
            clock: Box::new(clock),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_CAPACITY, SystemClock)
    }

    /// Records `key` and reports whether it was already seen within the TTL.
    ///
    /// A hit does not refresh the timestamp, so a steady stream of redeliveries
    /// cannot keep a key alive forever. An expired entry counts as new and is
    /// refreshed.
    pub fn is_duplicate(&self, key: &str) -> bool {
        let now = self.clock.now_millis();
        let mut seen = self.seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(&last_seen) = seen.get(key) {
            if now - last_seen <= self.ttl_millis {
                return true;
            }
        }

        if seen.len() >= self.capacity {
            let ttl = self.ttl_millis;
            let before = seen.len();
            seen.retain(|_, last_seen| now - *last_seen <= ttl);
            trace!(evicted = before - seen.len(), "dedup map over capacity");
        }

        seen.insert(key.to_string(), now);
        false
    }

    /// Checks an event under both its platform key and its content
    /// fingerprint. Catches an updated notification that keeps its key as
    /// well as an identical message re-posted under a new key.
    pub fn check_event(&self, event: &RawTextEvent) -> bool {
        let fp = fingerprint(
            &event.source_channel,
            &event.title,
            &event.text,
            event.timestamp_millis,
        );
        let by_key = self.is_duplicate(&event_key(event));
        let by_content = self.is_duplicate(&format!("fp:{fp}"));
        by_key || by_content
    }

    /// Drops both keys of `event`, so a later delivery is not suppressed.
    /// Used when an event was checked but could not be stored.
    pub fn forget_event(&self, event: &RawTextEvent) {
        let fp = fingerprint(
            &event.source_channel,
            &event.title,
            &event.text,
            event.timestamp_millis,
        );
        let mut seen = self.seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        seen.remove(&event_key(event));
        seen.remove(&format!("fp:{fp}"));
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forgets everything, as a process restart would.
    pub fn clear(&self) {
        self.seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clear();
    }
}
