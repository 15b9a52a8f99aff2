mod durable;
mod signal;
mod sqlite;
mod state;

pub use durable::{DurableStore, MemoryStore};
pub use signal::ChangeWatcher;
pub use sqlite::SqliteStore;
pub use state::{
    CACHE_KEY_PREFIX, CacheEntry, LocalState, SessionExpiration, SessionExpireReason,
    TIMESTAMP_SUFFIX,
};
