use crate::query::ViewQuery;
use jot_core::{Note, now_millis};
use jot_store::{CACHE_KEY_PREFIX, CacheEntry, LocalState};
use tracing::{debug, warn};

pub const DEFAULT_CACHE_TTL_MS: i64 = 5 * 60 * 1000;

/// TTL-bounded rendered results, one entry per distinct view query.
#[derive(Debug, Clone)]
pub struct ViewCache {
    state: LocalState,
    ttl_ms: i64,
}

impl ViewCache {
    pub fn new(state: LocalState, ttl_ms: i64) -> Self {
        Self { state, ttl_ms }
    }

    pub fn ttl_ms(&self) -> i64 {
        self.ttl_ms
    }

    pub fn key_of(query: &ViewQuery) -> String {
        match serde_json::to_string(query) {
            Ok(serialized) => format!("{CACHE_KEY_PREFIX}{serialized}"),
            Err(err) => {
                warn!(error = %err, "failed to serialize view query; using debug form");
                format!("{CACHE_KEY_PREFIX}{query:?}")
            }
        }
    }

    pub fn read(&self, query: &ViewQuery) -> Option<CacheEntry> {
        self.read_at(query, now_millis())
    }

    /// The entry for `query` if it was written no more than one TTL before `now_ms`.
    pub fn read_at(&self, query: &ViewQuery, now_ms: i64) -> Option<CacheEntry> {
        let key = Self::key_of(query);
        let entry = self.state.cache_entry(&key)?;
        let age_ms = now_ms.saturating_sub(entry.timestamp);
        if age_ms <= self.ttl_ms {
            Some(entry)
        } else {
            debug!(key = %key, age_ms, "view cache entry expired");
            None
        }
    }

    pub fn write(&self, query: &ViewQuery, notes: &[Note]) {
        self.write_at(query, notes, now_millis());
    }

    pub fn write_at(&self, query: &ViewQuery, notes: &[Note], now_ms: i64) {
        self.state
            .write_cache_entry(&Self::key_of(query), notes, now_ms);
    }

    pub fn invalidate(&self, query: &ViewQuery) {
        self.state.remove_cache_entry(&Self::key_of(query));
    }

    pub fn invalidate_all(&self) -> usize {
        self.state.clear_cache_entries()
    }

    /// Removes `note_id` from every persisted entry, touching only entries
    /// that actually contained it.
    pub fn remove_note(&self, note_id: &str, now_ms: i64) -> usize {
        let mut touched = 0;
        for key in self.state.cache_keys() {
            let Some(entry) = self.state.cache_entry(&key) else {
                self.state.remove_cache_entry(&key);
                continue;
            };
            let before = entry.notes.len();
            let remaining: Vec<Note> = entry
                .notes
                .into_iter()
                .filter(|note| note.id != note_id)
                .collect();
            if remaining.len() != before {
                self.state.write_cache_entry(&key, &remaining, now_ms);
                touched += 1;
            }
        }
        touched
    }
}
