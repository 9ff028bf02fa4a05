use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

use crate::feed::prices::PriceRecord;

struct CacheEntry {
    records: Vec<PriceRecord>,
    created_at: Instant,
}

/// Append-only accumulator of price records keyed by station and
/// observation time.
///
/// Entries expire lazily: a read past the TTL reports the key as absent but
/// leaves the entry in place, so later writes keep appending to the same
/// sequence. Nothing is ever physically evicted; memory is bounded only by
/// the number of distinct keys seen over the process lifetime.
pub struct RecordCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl RecordCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Append `record` under `key`, creating the entry on first write. The
    /// creation timestamp is set once and never refreshed by later puts.
    pub fn put(&self, key: &str, record: PriceRecord) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        match entries.get_mut(key) {
            Some(entry) => entry.records.push(record),
            None => {
                entries.insert(
                    key.to_owned(),
                    CacheEntry {
                        records: vec![record],
                        created_at: Instant::now(),
                    },
                );
            }
        }
    }

    /// Every record accumulated under `key` in insertion order, or `None`
    /// if the key was never written or its entry has outlived the TTL.
    #[allow(unused)]
    pub fn get(&self, key: &str) -> Option<Vec<PriceRecord>> {
        let entries = self.entries.lock().expect("cache lock poisoned");
        let entry = entries.get(key)?;
        if entry.created_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.records.clone())
    }
}
