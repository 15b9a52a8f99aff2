use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

/// Flat key/value storage that outlives a single command.
///
/// Writes never fail from the caller's point of view: a store that cannot
/// persist a value logs the problem and drops the write, and later reads may
/// observe the previous value.
pub trait DurableStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
    fn keys(&self) -> Vec<String>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that refuses writes once keys plus values exceed `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: Mutex::default(),
            quota_bytes: Some(quota_bytes),
        }
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DurableStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self.entries();

        if let Some(quota) = self.quota_bytes {
            let used: usize = entries
                .iter()
                .filter(|(existing, _)| existing.as_str() != key)
                .map(|(existing, stored)| existing.len() + stored.len())
                .sum();
            if used + key.len() + value.len() > quota {
                warn!(key, quota, "durable store quota exceeded; write dropped");
                return;
            }
        }

        entries.insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries().remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.entries().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove_round_trip() {
        let store = MemoryStore::new();
        store.set("token", "abc");
        assert_eq!(store.get("token").as_deref(), Some("abc"));
        assert_eq!(store.keys(), vec!["token".to_string()]);

        store.remove("token");
        assert!(store.get("token").is_none());
    }

    #[test]
    fn writes_past_quota_are_dropped_and_old_value_survives() {
        let store = MemoryStore::with_quota(16);
        store.set("k", "small");
        store.set("k", "this value is far too large");

        assert_eq!(store.get("k").as_deref(), Some("small"));
    }
}
