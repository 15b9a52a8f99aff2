use jot_core::Note;
use jot_fs::init_workspace;
use jot_store::{DurableStore, LocalState, SessionExpireReason, SqliteStore};
use serde_json::json;
use std::sync::Arc;

fn sqlite_state() -> (tempfile::TempDir, SqliteStore, LocalState) {
    let temp = tempfile::tempdir().expect("tempdir");
    let init = init_workspace(Some(temp.path()), None).expect("init workspace");
    let store = SqliteStore::from_workspace(&init.paths).expect("sqlite store");
    let state = LocalState::new(Arc::new(store.clone()));
    (temp, store, state)
}

#[test]
fn sqlite_store_round_trips_and_lists_keys() {
    let (_temp, store, _state) = sqlite_state();

    store.set("b", "2");
    store.set("a", "1");
    store.set("a", "one");

    assert_eq!(store.get("a").as_deref(), Some("one"));
    assert_eq!(store.keys(), vec!["a".to_string(), "b".to_string()]);

    store.remove("a");
    assert!(store.get("a").is_none());
}

#[test]
fn state_survives_reopening_the_database() {
    let (temp, _store, state) = sqlite_state();
    state.set_token("tok-1");
    state.set_global_notes(&[Note::new("n1").with_title("hello")]);

    let reopened =
        SqliteStore::open(&temp.path().join(".jot").join("state.db")).expect("reopen store");
    let state = LocalState::new(Arc::new(reopened));

    assert_eq!(state.token().as_deref(), Some("tok-1"));
    assert_eq!(state.global_notes()[0].title, "hello");
}

#[test]
fn legacy_mirror_entries_are_normalized_on_read() {
    let (_temp, store, state) = sqlite_state();
    store.set(
        "notes",
        &json!([{"_id": "x", "title": "t"}, {"title": "no id"}]).to_string(),
    );

    let notes = state.global_notes();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].id, "x");
}

#[test]
fn expiring_a_session_backs_up_data_and_clears_auth() {
    let (_temp, store, state) = sqlite_state();
    state.set_token("tok");
    state.set_last_token_refresh(5);
    state.set_user(&json!({"username": "ada"}));
    state.set_global_notes(&[Note::new("n1")]);
    store.set("auth_errors", "3");

    let expiration = state.expire_session(SessionExpireReason::AuthExpired, None, 1_234);

    assert!(expiration.cross_device_login);
    assert!(state.token().is_none());
    assert!(state.last_token_refresh().is_none());
    assert!(store.get("auth_errors").is_none());
    assert!(state.backup("user").is_some_and(|raw| raw.contains("ada")));
    assert!(state.backup("notes").is_some());
    assert!(state.backup("categories").is_none());
    assert_eq!(store.get("session_expire_reason").as_deref(), Some("auth_expired"));
    assert_eq!(store.get("session_expire_time").as_deref(), Some("1234"));

    let taken = state.take_session_expiration().expect("markers");
    assert_eq!(taken.reason, SessionExpireReason::AuthExpired);
    assert!(state.take_session_expiration().is_none());
}

#[test]
fn clearing_caches_leaves_other_keys_alone() {
    let (_temp, store, state) = sqlite_state();
    state.write_cache_entry("notes_cache_a", &[Note::new("1")], 1);
    state.write_cache_entry("notes_cache_b", &[], 2);
    state.set_view_mode("list");

    assert_eq!(state.clear_cache_entries(), 2);
    assert!(state.cache_keys().is_empty());
    assert!(store.get("notes_cache_a_timestamp").is_none());
    assert_eq!(state.view_mode().as_deref(), Some("list"));
}
