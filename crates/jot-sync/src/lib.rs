mod cache;
mod coordinator;
mod endpoint;
mod export;
mod filter;
mod global;
mod query;

pub use cache::{DEFAULT_CACHE_TTL_MS, ViewCache};
pub use coordinator::{LoadOutcome, LoadState, NoteSource, SyncCoordinator};
pub use endpoint::fetch_view;
pub use export::{ExportFormat, ExportOptions, ExportSummary, export_notes, html_to_markdown};
pub use filter::{filter_local_notes, note_matches};
pub use global::GlobalStore;
pub use query::{LoadOptions, ViewKind, ViewMode, ViewQuery};
