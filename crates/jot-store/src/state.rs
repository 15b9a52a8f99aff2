use crate::durable::DurableStore;
use jot_core::{Note, normalize_note_value};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

pub const CACHE_KEY_PREFIX: &str = "notes_cache_";
pub const TIMESTAMP_SUFFIX: &str = "_timestamp";

const TOKEN_KEY: &str = "token";
const LAST_TOKEN_REFRESH_KEY: &str = "lastTokenRefresh";
const AUTH_ERRORS_KEY: &str = "auth_errors";
const USER_KEY: &str = "user";
const NOTES_KEY: &str = "notes";
const NOTES_UPDATED_KEY: &str = "notes_updated";
const VIEW_MODE_KEY: &str = "viewMode";
const SESSION_EXPIRE_REASON_KEY: &str = "session_expire_reason";
const SESSION_EXPIRE_MESSAGE_KEY: &str = "session_expire_message";
const SESSION_EXPIRE_TIME_KEY: &str = "session_expire_time";
const CROSS_DEVICE_LOGIN_KEY: &str = "cross_device_login";
const BACKED_UP_KEYS: [&str; 4] = [USER_KEY, NOTES_KEY, "categories", "tags"];

const DEFAULT_EXPIRE_MESSAGE: &str = "Session expired, please sign in again";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntry {
    pub key: String,
    pub notes: Vec<Note>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionExpireReason {
    DbReset,
    DbInitialized,
    UserDeleted,
    AuthExpired,
    SessionExpired,
}

impl SessionExpireReason {
    pub fn from_code(code: Option<&str>) -> Self {
        match code {
            Some("DB_RESET") => Self::DbReset,
            Some("DB_INITIALIZED") | Some("DB_NEEDS_INIT") => Self::DbInitialized,
            Some("USER_NOT_FOUND") => Self::UserDeleted,
            Some("AUTH_EXPIRED") | Some("INVALID_TOKEN") => Self::AuthExpired,
            _ => Self::SessionExpired,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DbReset => "db_reset",
            Self::DbInitialized => "db_initialized",
            Self::UserDeleted => "user_deleted",
            Self::AuthExpired => "auth_expired",
            Self::SessionExpired => "session_expired",
        }
    }

    fn parse(raw: &str) -> Self {
        match raw {
            "db_reset" => Self::DbReset,
            "db_initialized" => Self::DbInitialized,
            "user_deleted" => Self::UserDeleted,
            "auth_expired" => Self::AuthExpired,
            _ => Self::SessionExpired,
        }
    }
}

/// Markers left behind by a terminal auth failure, read once by the next login.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionExpiration {
    pub reason: SessionExpireReason,
    pub message: String,
    pub expired_at: i64,
    pub cross_device_login: bool,
}

/// Typed accessors over every key the client persists.
#[derive(Clone)]
pub struct LocalState {
    store: Arc<dyn DurableStore>,
}

impl std::fmt::Debug for LocalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalState").finish_non_exhaustive()
    }
}

impl LocalState {
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(crate::MemoryStore::new()))
    }

    pub fn store(&self) -> &Arc<dyn DurableStore> {
        &self.store
    }

    pub fn token(&self) -> Option<String> {
        self.store
            .get(TOKEN_KEY)
            .filter(|token| !token.trim().is_empty())
    }

    pub fn set_token(&self, token: &str) {
        self.store.set(TOKEN_KEY, token);
    }

    pub fn last_token_refresh(&self) -> Option<i64> {
        self.store
            .get(LAST_TOKEN_REFRESH_KEY)
            .and_then(|raw| raw.parse().ok())
    }

    pub fn set_last_token_refresh(&self, at_ms: i64) {
        self.store.set(LAST_TOKEN_REFRESH_KEY, &at_ms.to_string());
    }

    pub fn clear_token(&self) {
        self.store.remove(TOKEN_KEY);
    }

    pub fn clear_auth(&self) {
        self.store.remove(TOKEN_KEY);
        self.store.remove(AUTH_ERRORS_KEY);
        self.store.remove(LAST_TOKEN_REFRESH_KEY);
    }

    pub fn user(&self) -> Option<Value> {
        self.store
            .get(USER_KEY)
            .and_then(|raw| serde_json::from_str(&raw).ok())
    }

    pub fn set_user(&self, user: &Value) {
        self.store.set(USER_KEY, &user.to_string());
    }

    pub fn clear_user(&self) {
        self.store.remove(USER_KEY);
    }

    /// The full local mirror. An unreadable snapshot reads as empty.
    pub fn global_notes(&self) -> Vec<Note> {
        let Some(raw) = self.store.get(NOTES_KEY) else {
            return Vec::new();
        };
        decode_notes(&raw, NOTES_KEY)
    }

    pub fn set_global_notes(&self, notes: &[Note]) {
        self.write_json(NOTES_KEY, notes);
    }

    pub fn cache_entry(&self, key: &str) -> Option<CacheEntry> {
        let raw = self.store.get(key)?;
        let timestamp = self
            .store
            .get(&timestamp_key(key))
            .and_then(|raw| raw.parse::<i64>().ok())?;

        Some(CacheEntry {
            key: key.to_string(),
            notes: decode_notes(&raw, key),
            timestamp,
        })
    }

    pub fn write_cache_entry(&self, key: &str, notes: &[Note], timestamp: i64) {
        self.write_json(key, notes);
        self.store.set(&timestamp_key(key), &timestamp.to_string());
    }

    pub fn remove_cache_entry(&self, key: &str) {
        self.store.remove(key);
        self.store.remove(&timestamp_key(key));
    }

    /// Every persisted view cache key, excluding timestamp companions.
    pub fn cache_keys(&self) -> Vec<String> {
        self.store
            .keys()
            .into_iter()
            .filter(|key| key.starts_with(CACHE_KEY_PREFIX) && !key.ends_with(TIMESTAMP_SUFFIX))
            .collect()
    }

    pub fn clear_cache_entries(&self) -> usize {
        let keys = self.cache_keys();
        for key in &keys {
            self.remove_cache_entry(key);
        }
        keys.len()
    }

    pub fn notes_updated(&self) -> Option<i64> {
        self.store
            .get(NOTES_UPDATED_KEY)
            .and_then(|raw| raw.parse().ok())
    }

    /// Publishes the coarse "notes changed" signal. Values never go backwards,
    /// even when two publishes land in the same millisecond.
    pub fn publish_notes_updated(&self, now_ms: i64) -> i64 {
        let next = match self.notes_updated() {
            Some(previous) if previous >= now_ms => previous.saturating_add(1),
            _ => now_ms,
        };
        self.store.set(NOTES_UPDATED_KEY, &next.to_string());
        next
    }

    pub fn view_mode(&self) -> Option<String> {
        self.store.get(VIEW_MODE_KEY)
    }

    pub fn set_view_mode(&self, mode: &str) {
        self.store.set(VIEW_MODE_KEY, mode);
    }

    /// Backs up user data, drops auth state and leaves expiration markers.
    pub fn expire_session(
        &self,
        reason: SessionExpireReason,
        message: Option<&str>,
        now_ms: i64,
    ) -> SessionExpiration {
        for key in BACKED_UP_KEYS {
            if let Some(value) = self.store.get(key) {
                self.store.set(&format!("{key}_backup"), &value);
            }
        }

        self.clear_auth();

        let message = message
            .filter(|message| !message.trim().is_empty())
            .unwrap_or(DEFAULT_EXPIRE_MESSAGE)
            .to_string();
        let cross_device_login = reason == SessionExpireReason::AuthExpired;

        self.store.set(SESSION_EXPIRE_REASON_KEY, reason.as_str());
        self.store.set(SESSION_EXPIRE_MESSAGE_KEY, &message);
        self.store.set(SESSION_EXPIRE_TIME_KEY, &now_ms.to_string());
        if cross_device_login {
            self.store.set(CROSS_DEVICE_LOGIN_KEY, "true");
        }

        debug!(reason = reason.as_str(), "session expiration recorded");

        SessionExpiration {
            reason,
            message,
            expired_at: now_ms,
            cross_device_login,
        }
    }

    pub fn session_expiration(&self) -> Option<SessionExpiration> {
        let reason = self.store.get(SESSION_EXPIRE_REASON_KEY)?;
        Some(SessionExpiration {
            reason: SessionExpireReason::parse(&reason),
            message: self
                .store
                .get(SESSION_EXPIRE_MESSAGE_KEY)
                .unwrap_or_else(|| DEFAULT_EXPIRE_MESSAGE.to_string()),
            expired_at: self
                .store
                .get(SESSION_EXPIRE_TIME_KEY)
                .and_then(|raw| raw.parse().ok())
                .unwrap_or_default(),
            cross_device_login: self.store.get(CROSS_DEVICE_LOGIN_KEY).as_deref() == Some("true"),
        })
    }

    /// Reads the expiration markers and clears them so they are shown once.
    pub fn take_session_expiration(&self) -> Option<SessionExpiration> {
        let expiration = self.session_expiration()?;
        self.store.remove(SESSION_EXPIRE_REASON_KEY);
        self.store.remove(SESSION_EXPIRE_MESSAGE_KEY);
        self.store.remove(SESSION_EXPIRE_TIME_KEY);
        self.store.remove(CROSS_DEVICE_LOGIN_KEY);
        Some(expiration)
    }

    pub fn backup(&self, key: &str) -> Option<String> {
        self.store.get(&format!("{key}_backup"))
    }

    fn write_json(&self, key: &str, notes: &[Note]) {
        match serde_json::to_string(notes) {
            Ok(serialized) => self.store.set(key, &serialized),
            Err(err) => warn!(key, error = %err, "failed to encode notes; write skipped"),
        }
    }
}

fn timestamp_key(key: &str) -> String {
    format!("{key}{TIMESTAMP_SUFFIX}")
}

fn decode_notes(raw: &str, key: &str) -> Vec<Note> {
    match serde_json::from_str::<Vec<Value>>(raw) {
        Ok(values) => values.into_iter().filter_map(normalize_note_value).collect(),
        Err(err) => {
            warn!(key, error = %err, "stored notes are unreadable; treating as empty");
            Vec::new()
        }
    }
}
