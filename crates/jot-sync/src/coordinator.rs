use crate::cache::ViewCache;
use crate::endpoint::fetch_view;
use crate::filter::{filter_local_notes, note_matches};
use crate::global::GlobalStore;
use crate::query::{LoadOptions, ViewKind, ViewMode, ViewQuery};
use chrono::{DateTime, SecondsFormat};
use jot_api::{ApiClient, ApiResponse};
use jot_core::{JotError, JotResult, Note, now_millis};
use jot_store::{ChangeWatcher, LocalState};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    Idle,
    Loading,
    Success,
    Degraded,
    Failed,
}

/// Where the notes of a finished load came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteSource {
    /// Fresh view cache entry, no network call made.
    Cache,
    Network,
    /// Fresh view cache entry served after the network failed.
    CacheFallback,
    /// Local mirror filtered with the view predicate.
    Mirror,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadOutcome {
    pub state: LoadState,
    pub source: Option<NoteSource>,
    pub query: ViewQuery,
    pub kind: ViewKind,
    pub notes: Vec<Note>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JotError>,
}

impl LoadOutcome {
    pub fn is_failed(&self) -> bool {
        self.state == LoadState::Failed
    }

    /// Converts a failed load into its error; other outcomes pass through.
    pub fn into_result(self) -> JotResult<Self> {
        match (self.state, &self.error) {
            (LoadState::Failed, Some(err)) => Err(err.clone()),
            _ => Ok(self),
        }
    }
}

/// Degradation strategies tried in order after a failed fetch.
#[derive(Debug, Clone, Copy)]
enum Fallback {
    AssertiveMirror,
    FreshCache,
    Mirror,
}

const FALLBACK_CHAIN: [Fallback; 3] = [
    Fallback::AssertiveMirror,
    Fallback::FreshCache,
    Fallback::Mirror,
];

#[derive(Debug)]
struct Progress {
    state: LoadState,
    last_query: Option<ViewQuery>,
}

/// Orchestrates view loads across the view cache, the server and the mirror.
#[derive(Debug)]
pub struct SyncCoordinator {
    api: ApiClient,
    state: LocalState,
    global: GlobalStore,
    cache: ViewCache,
    progress: Mutex<Progress>,
}

impl SyncCoordinator {
    pub fn new(api: ApiClient, cache_ttl_ms: i64) -> Self {
        let state = api.state().clone();
        Self {
            global: GlobalStore::new(state.clone()),
            cache: ViewCache::new(state.clone(), cache_ttl_ms),
            state,
            api,
            progress: Mutex::new(Progress {
                state: LoadState::Idle,
                last_query: None,
            }),
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn global(&self) -> &GlobalStore {
        &self.global
    }

    pub fn cache(&self) -> &ViewCache {
        &self.cache
    }

    pub fn load_state(&self) -> LoadState {
        self.progress().state
    }

    pub fn last_query(&self) -> Option<ViewQuery> {
        self.progress().last_query.clone()
    }

    pub fn watcher(&self) -> ChangeWatcher {
        ChangeWatcher::new(self.state.clone())
    }

    pub fn load_notes(&self, options: LoadOptions) -> LoadOutcome {
        self.load_notes_at(options, now_millis())
    }

    pub fn load_notes_at(&self, options: LoadOptions, now_ms: i64) -> LoadOutcome {
        let query = options.query.normalized();
        {
            let mut progress = self.progress();
            progress.last_query = Some(query.clone());
            progress.state = LoadState::Loading;
        }

        if let Some(note_id) = options.note_id_to_remove.as_deref() {
            let in_mirror = self.global.remove(note_id);
            let cached_views = self.cache.remove_note(note_id, now_ms);
            debug!(note_id, in_mirror, cached_views, "removed note from local state");
        }

        if !options.force_refresh
            && let Some(entry) = self.cache.read_at(&query, now_ms)
        {
            debug!(key = %entry.key, "view cache hit");
            return self.finish(query, LoadState::Success, Some(NoteSource::Cache), entry.notes, None, now_ms);
        }

        match fetch_view(&self.api, &query) {
            Ok(mut notes) => {
                GlobalStore::apply_view_assertion(&mut notes, &query);
                self.global.merge_by_id(&notes);
                self.cache.write_at(&query, &notes, now_ms);
                self.finish(query, LoadState::Success, Some(NoteSource::Network), notes, None, now_ms)
            }
            Err(err) => {
                warn!(error = %err, "view fetch failed; trying local fallbacks");
                for strategy in FALLBACK_CHAIN {
                    if let Some((notes, source)) = self.try_fallback(strategy, &query, now_ms) {
                        info!(?strategy, count = notes.len(), "serving degraded view");
                        return self.finish(query, LoadState::Degraded, Some(source), notes, None, now_ms);
                    }
                }
                self.finish(query, LoadState::Failed, None, Vec::new(), Some(err), now_ms)
            }
        }
    }

    /// Reloads the last view, bypassing the cache.
    pub fn refresh_notes(&self) -> LoadOutcome {
        self.load_notes(self.last_options().force_refresh())
    }

    /// Drops `note_id` from the mirror and every cached view, then reloads
    /// the last view from the server.
    pub fn remove_note(&self, note_id: &str) -> LoadOutcome {
        self.load_notes(self.last_options().force_refresh().removing(note_id))
    }

    pub fn force_refresh_all(&self) -> LoadOutcome {
        let cleared = self.cache.invalidate_all();
        debug!(cleared, "cleared every view cache entry");
        self.refresh_notes()
    }

    pub fn set_view_mode(&self, mode: &str) -> JotResult<LoadOutcome> {
        let mode = ViewMode::parse(mode)
            .ok_or_else(|| JotError::usage(format!("view mode must be grid or list, got '{mode}'")))?;
        self.state.set_view_mode(mode.as_str());

        let mut options = self.last_options();
        options.query.view_mode = Some(mode);
        Ok(self.load_notes(options))
    }

    pub fn view_mode(&self) -> Option<ViewMode> {
        self.state.view_mode().as_deref().and_then(ViewMode::parse)
    }

    pub fn trash_note(&self, note_id: &str) -> JotResult<Option<Note>> {
        let response = self.api.trash_note(note_id)?;
        let deleted_at = rfc3339_millis(now_millis());
        Ok(self.write_through(note_id, &response, |note| {
            note.in_trash = true;
            note.deleted_at = deleted_at.clone();
        }))
    }

    pub fn restore_note(&self, note_id: &str) -> JotResult<Option<Note>> {
        let response = self.api.restore_note(note_id)?;
        Ok(self.write_through(note_id, &response, |note| {
            note.in_trash = false;
            note.deleted_at = None;
        }))
    }

    /// Toggles the star; a note in the response is taken as-is, otherwise the
    /// local flag is flipped.
    pub fn toggle_star(&self, note_id: &str) -> JotResult<Option<Note>> {
        let response = self.api.toggle_star(note_id)?;
        let updated = match response.note() {
            Some(note) => {
                self.global.merge_by_id(std::slice::from_ref(&note));
                Some(note)
            }
            None => self.global.update(note_id, |note| note.starred = !note.starred),
        };
        self.after_mutation();
        Ok(updated)
    }

    fn write_through(
        &self,
        note_id: &str,
        response: &ApiResponse,
        patch: impl Fn(&mut Note),
    ) -> Option<Note> {
        let updated = match response.note() {
            Some(mut note) => {
                if let Some(existing) = self.global.get(&note.id) {
                    note.starred = note.starred || existing.starred;
                }
                patch(&mut note);
                self.global.merge_by_id(std::slice::from_ref(&note));
                Some(note)
            }
            None => self.global.update(note_id, &patch),
        };
        self.after_mutation();
        updated
    }

    fn after_mutation(&self) {
        self.cache.invalidate_all();
        self.state.publish_notes_updated(now_millis());
    }

    fn try_fallback(
        &self,
        strategy: Fallback,
        query: &ViewQuery,
        now_ms: i64,
    ) -> Option<(Vec<Note>, NoteSource)> {
        match strategy {
            Fallback::AssertiveMirror => {
                if !query.is_assertive() {
                    return None;
                }
                let notes = self.global.filter(|note| note_matches(note, query));
                (!notes.is_empty()).then_some((notes, NoteSource::Mirror))
            }
            Fallback::FreshCache => self
                .cache
                .read_at(query, now_ms)
                .map(|entry| (entry.notes, NoteSource::CacheFallback)),
            Fallback::Mirror => {
                let snapshot = self.global.snapshot();
                if snapshot.is_empty() {
                    return None;
                }
                let notes = filter_local_notes(&snapshot, query);
                self.cache.write_at(query, &notes, now_ms);
                Some((notes, NoteSource::Mirror))
            }
        }
    }

    fn finish(
        &self,
        query: ViewQuery,
        state: LoadState,
        source: Option<NoteSource>,
        notes: Vec<Note>,
        error: Option<JotError>,
        now_ms: i64,
    ) -> LoadOutcome {
        if matches!(state, LoadState::Success | LoadState::Degraded) {
            self.state.publish_notes_updated(now_ms);
        }
        self.progress().state = state;

        LoadOutcome {
            kind: query.kind(),
            state,
            source,
            query,
            notes,
            error,
        }
    }

    fn last_options(&self) -> LoadOptions {
        let query = self.last_query().unwrap_or_else(|| ViewQuery {
            view_mode: self.view_mode(),
            ..ViewQuery::default()
        });
        LoadOptions::new(query)
    }

    fn progress(&self) -> MutexGuard<'_, Progress> {
        self.progress
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn rfc3339_millis(epoch_ms: i64) -> Option<String> {
    DateTime::from_timestamp_millis(epoch_ms)
        .map(|at| at.to_rfc3339_opts(SecondsFormat::Millis, true))
}
