use crate::query::ViewQuery;
use jot_core::Note;
use jot_store::LocalState;
use std::collections::HashMap;
use tracing::debug;

/// The local mirror of every note ever observed, keyed by id.
///
/// Every mutation reads the whole snapshot and writes it back; two writers
/// racing on the same store resolve as last-writer-wins.
#[derive(Debug, Clone)]
pub struct GlobalStore {
    state: LocalState,
}

impl GlobalStore {
    pub fn new(state: LocalState) -> Self {
        Self { state }
    }

    pub fn snapshot(&self) -> Vec<Note> {
        self.state.global_notes()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    pub fn get(&self, note_id: &str) -> Option<Note> {
        self.snapshot().into_iter().find(|note| note.id == note_id)
    }

    /// Replaces or inserts each incoming note whole; later entries win.
    /// Known notes keep their position and new ones are appended.
    pub fn merge_by_id(&self, notes: &[Note]) -> usize {
        let mut merged = self.snapshot();
        let mut positions: HashMap<String, usize> = merged
            .iter()
            .enumerate()
            .map(|(index, note)| (note.id.clone(), index))
            .collect();

        for note in notes {
            match positions.get(&note.id) {
                Some(&index) => merged[index] = note.clone(),
                None => {
                    positions.insert(note.id.clone(), merged.len());
                    merged.push(note.clone());
                }
            }
        }

        self.state.set_global_notes(&merged);
        debug!(incoming = notes.len(), total = merged.len(), "merged notes into mirror");
        merged.len()
    }

    pub fn filter(&self, predicate: impl Fn(&Note) -> bool) -> Vec<Note> {
        self.snapshot()
            .into_iter()
            .filter(|note| predicate(note))
            .collect()
    }

    pub fn remove(&self, note_id: &str) -> bool {
        let notes = self.snapshot();
        let before = notes.len();
        let remaining: Vec<Note> = notes.into_iter().filter(|note| note.id != note_id).collect();
        if remaining.len() == before {
            return false;
        }
        self.state.set_global_notes(&remaining);
        true
    }

    /// Applies `patch` to the stored note and writes the result back whole.
    pub fn update(&self, note_id: &str, patch: impl FnOnce(&mut Note)) -> Option<Note> {
        let mut note = self.get(note_id)?;
        patch(&mut note);
        self.merge_by_id(std::slice::from_ref(&note));
        Some(note)
    }

    pub fn clear(&self) {
        self.state.set_global_notes(&[]);
    }

    /// Stamps the flags an assertive view implies onto its results.
    pub fn apply_view_assertion(notes: &mut [Note], query: &ViewQuery) {
        for note in notes {
            if query.in_trash {
                note.in_trash = true;
            }
            if query.is_starred {
                note.starred = true;
            }
            if query.is_shared {
                note.shared = true;
            }
        }
    }
}
