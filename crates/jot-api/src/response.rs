use jot_core::{JotError, JotResult, Note, normalize_note_value};
use serde::Serialize;
use serde_json::{Value, json};

/// A classified 2xx response. Object bodies always carry `success`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn empty(status: u16) -> Self {
        Self::new(status, json!({ "success": true }))
    }

    pub fn is_success(&self) -> bool {
        self.body
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }

    pub fn message(&self) -> Option<&str> {
        self.body.get("message").and_then(Value::as_str)
    }

    /// Fails with a server error when the envelope reports `success: false`.
    pub fn ensure_success(self) -> JotResult<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let message = self
            .message()
            .unwrap_or("server reported failure")
            .to_string();
        Err(JotError::server(self.status, message))
    }

    /// The note array under `notes` or `data`, or the body itself when it is
    /// a bare array. Entries without an identifier are dropped.
    pub fn notes(&self) -> Vec<Note> {
        let array = match &self.body {
            Value::Array(items) => Some(items),
            body => ["notes", "data"]
                .iter()
                .find_map(|key| body.get(*key).and_then(Value::as_array)),
        };

        array
            .map(|items| {
                items
                    .iter()
                    .cloned()
                    .filter_map(normalize_note_value)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// A single note under `note` or `data`, as returned by mutation endpoints.
    pub fn note(&self) -> Option<Note> {
        ["note", "data"]
            .iter()
            .filter_map(|key| self.body.get(*key))
            .find(|value| value.is_object())
            .cloned()
            .and_then(normalize_note_value)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }
}
