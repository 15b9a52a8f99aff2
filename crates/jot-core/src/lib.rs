mod error;
mod note;

pub use error::{ErrorKind, ExitCode, JotError, JotResult};
pub use note::{Note, TagRef, Tags, normalize_note_value};

/// Current wall-clock time as epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
