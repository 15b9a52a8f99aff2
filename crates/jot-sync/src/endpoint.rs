use crate::query::{ViewKind, ViewQuery};
use jot_api::ApiClient;
use jot_core::{JotResult, Note};
use tracing::{debug, warn};

/// Fetches one view from the server using the endpoint its kind selects.
///
/// Specialized endpoints fall back to the generic `/api/notes` listing with
/// the equivalent filter when they fail for any non-terminal reason.
pub fn fetch_view(api: &ApiClient, query: &ViewQuery) -> JotResult<Vec<Note>> {
    let kind = query.kind();
    debug!(?kind, "fetching view from server");

    match kind {
        ViewKind::Trash => with_fallback(
            "trash",
            || api.list_trashed_notes(),
            || api.list_notes(&[("inTrash", "true".to_string())]),
        ),
        ViewKind::Category(category_id) => api.list_notes(&[("categoryId", category_id)]),
        ViewKind::Tag(tag_id) => {
            let notes = with_fallback(
                "tag",
                || api.list_tag_notes(&tag_id),
                || api.list_notes(&[("tagId", tag_id.clone())]),
            )?;
            Ok(notes
                .into_iter()
                .filter(|note| note.has_tag(&tag_id))
                .collect())
        }
        ViewKind::Starred => with_fallback(
            "starred",
            || api.list_starred_notes(),
            || api.list_notes(&[("starred", "true".to_string())]),
        ),
        ViewKind::Shared => api.list_notes(&[("shared", "true".to_string())]),
        ViewKind::Search(search) => api.list_notes(&[("query", search)]),
        ViewKind::All => api.list_notes(&[("inTrash", "false".to_string())]),
    }
}

fn with_fallback(
    endpoint: &str,
    specialized: impl FnOnce() -> JotResult<Vec<Note>>,
    generic: impl FnOnce() -> JotResult<Vec<Note>>,
) -> JotResult<Vec<Note>> {
    match specialized() {
        Ok(notes) => Ok(notes),
        Err(err) if err.is_terminal_auth() => Err(err),
        Err(err) => {
            warn!(endpoint, error = %err, "specialized endpoint failed; using generic listing");
            generic()
        }
    }
}
