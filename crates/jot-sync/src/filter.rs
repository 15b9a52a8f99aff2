use crate::query::ViewQuery;
use jot_core::Note;

/// Local equivalent of a server-side view, used when the network path fails.
///
/// All conditions combine with AND; the trash flag always participates, so
/// non-trash views never surface trashed notes.
pub fn note_matches(note: &Note, query: &ViewQuery) -> bool {
    if note.in_trash != query.in_trash {
        return false;
    }

    if let Some(category_id) = &query.category_id {
        if note.category_id.as_deref() != Some(category_id.as_str()) {
            return false;
        }
    } else if let Some(excluded) = &query.exclude_category
        && note.category_id.as_deref() == Some(excluded.as_str())
    {
        return false;
    }

    if let Some(tag_id) = &query.tag_id
        && !note.has_tag(tag_id)
    {
        return false;
    }

    if query.is_starred && !note.starred {
        return false;
    }

    if query.is_shared && !note.shared {
        return false;
    }

    if let Some(search) = &query.search_query {
        let needle = search.to_lowercase();
        if !note.title.to_lowercase().contains(&needle)
            && !note.content.to_lowercase().contains(&needle)
        {
            return false;
        }
    }

    true
}

pub fn filter_local_notes(notes: &[Note], query: &ViewQuery) -> Vec<Note> {
    notes
        .iter()
        .filter(|note| note_matches(note, query))
        .cloned()
        .collect()
}
