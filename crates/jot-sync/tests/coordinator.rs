use httpmock::Method::{GET, POST, PUT};
use httpmock::MockServer;
use jot_api::ApiClient;
use jot_core::{ErrorKind, Note};
use jot_store::LocalState;
use jot_sync::{
    DEFAULT_CACHE_TTL_MS, LoadOptions, LoadState, NoteSource, SyncCoordinator, ViewKind,
    ViewMode, ViewQuery,
};
use serde_json::json;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;

fn coordinator(server: &MockServer) -> SyncCoordinator {
    let state = LocalState::in_memory();
    state.set_token("tok");
    let api = ApiClient::new(&server.base_url(), state).expect("api client");
    SyncCoordinator::new(api, DEFAULT_CACHE_TTL_MS)
}

fn ids(notes: &[Note]) -> Vec<&str> {
    notes.iter().map(|note| note.id.as_str()).collect()
}

#[test]
fn network_result_is_merged_cached_and_then_served_from_cache() {
    let server = MockServer::start();
    let listing = server.mock(|when, then| {
        when.method(GET)
            .path("/api/notes")
            .query_param("inTrash", "false");
        then.status(200)
            .json_body(json!({"notes": [{"_id": "a", "title": "A"}, {"id": "b", "title": "B"}]}));
    });

    let sync = coordinator(&server);
    let first = sync.load_notes(LoadOptions::new(ViewQuery::all()));
    assert_eq!(first.state, LoadState::Success);
    assert_eq!(first.source, Some(NoteSource::Network));
    assert_eq!(ids(&first.notes), vec!["a", "b"]);
    assert_eq!(sync.global().get("a").expect("mirrored").title, "A");

    let second = sync.load_notes(LoadOptions::new(ViewQuery::all()));
    assert_eq!(second.source, Some(NoteSource::Cache));
    assert_eq!(ids(&second.notes), vec!["a", "b"]);
    listing.assert_hits(1);
    assert_eq!(sync.load_state(), LoadState::Success);
}

#[test]
fn reachable_network_never_falls_back_to_the_mirror() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/notes");
        then.status(200).json_body(json!({"success": true, "data": []}));
    });

    let sync = coordinator(&server);
    sync.global().merge_by_id(&[Note::new("local-only")]);

    let outcome = sync.load_notes(LoadOptions::new(ViewQuery::all()).force_refresh());
    assert_eq!(outcome.state, LoadState::Success);
    assert!(outcome.notes.is_empty());
}

#[test]
fn trash_view_degrades_to_mirror_on_server_error() {
    let server = MockServer::start();
    let specialized = server.mock(|when, then| {
        when.method(GET).path("/api/notes/trash");
        then.status(500).json_body(json!({"message": "boom"}));
    });
    let generic = server.mock(|when, then| {
        when.method(GET).path("/api/notes").query_param("inTrash", "true");
        then.status(500).json_body(json!({"message": "boom"}));
    });

    let sync = coordinator(&server);
    sync.global().merge_by_id(&[Note::new("1").in_trash(true), Note::new("2")]);

    let outcome = sync.load_notes(LoadOptions::new(ViewQuery::trash()));

    specialized.assert_hits(1);
    generic.assert_hits(1);
    assert_eq!(outcome.state, LoadState::Degraded);
    assert_eq!(outcome.kind, ViewKind::Trash);
    assert_eq!(ids(&outcome.notes), vec!["1"]);
    assert!(outcome.notes[0].in_trash);
    assert!(outcome.error.is_none());
}

#[test]
fn fresh_cache_is_preferred_over_the_mirror_when_offline() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/notes");
        then.status(503);
    });

    let sync = coordinator(&server);
    sync.cache().write(&ViewQuery::all(), &[Note::new("cached")]);
    sync.global().merge_by_id(&[Note::new("mirrored")]);

    let outcome = sync.load_notes(LoadOptions::new(ViewQuery::all()).force_refresh());

    assert_eq!(outcome.state, LoadState::Degraded);
    assert_eq!(outcome.source, Some(NoteSource::CacheFallback));
    assert_eq!(ids(&outcome.notes), vec!["cached"]);
}

#[test]
fn truncated_response_keeps_the_cached_view() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let mut request = Vec::new();
        let mut buf = [0_u8; 1024];
        while !request.windows(4).any(|window| window == b"\r\n\r\n") {
            let read = stream.read(&mut buf).expect("read request");
            if read == 0 {
                break;
            }
            request.extend_from_slice(&buf[..read]);
        }
        stream
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 500\r\n\r\n{\"notes\":[")
            .expect("write response");
    });

    let api = ApiClient::new(&format!("http://{addr}"), LocalState::in_memory())
        .expect("api client");
    let sync = SyncCoordinator::new(api, DEFAULT_CACHE_TTL_MS);
    sync.cache().write(&ViewQuery::all(), &[Note::new("cached")]);
    sync.global().merge_by_id(&[Note::new("mirrored")]);

    let outcome = sync.load_notes(LoadOptions::new(ViewQuery::all()).force_refresh());
    server.join().expect("server thread");

    assert_eq!(outcome.state, LoadState::Degraded);
    assert_eq!(outcome.source, Some(NoteSource::CacheFallback));
    assert_eq!(ids(&outcome.notes), vec!["cached"]);
    let cached = sync.cache().read(&ViewQuery::all()).expect("cache entry");
    assert_eq!(ids(&cached.notes), vec!["cached"]);
}

#[test]
fn mirror_fallback_filters_locally_and_writes_the_cache() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/notes");
        then.status(500);
    });

    let sync = coordinator(&server);
    sync.global().merge_by_id(&[
        Note::new("keep").with_title("groceries"),
        Note::new("skip").with_title("taxes"),
        Note::new("binned").with_title("old groceries").in_trash(true),
    ]);

    let query = ViewQuery::search("grocer");
    let outcome = sync.load_notes(LoadOptions::new(query.clone()));

    assert_eq!(outcome.state, LoadState::Degraded);
    assert_eq!(outcome.source, Some(NoteSource::Mirror));
    assert_eq!(ids(&outcome.notes), vec!["keep"]);
    let cached = sync.cache().read(&query).expect("cache written");
    assert_eq!(ids(&cached.notes), vec!["keep"]);
}

#[test]
fn exhausted_fallbacks_fail_with_the_fetch_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/notes");
        then.status(500).json_body(json!({"error": "database unavailable"}));
    });

    let sync = coordinator(&server);
    let mut watcher = sync.watcher();
    let outcome = sync.load_notes(LoadOptions::new(ViewQuery::all()));

    assert!(outcome.is_failed());
    assert_eq!(sync.load_state(), LoadState::Failed);
    let error = outcome.into_result().expect_err("failed load");
    assert_eq!(error.kind, ErrorKind::Server);
    assert_eq!(error.status, Some(500));
    assert!(!watcher.poll());
}

#[test]
fn terminal_auth_failure_runs_through_the_same_fallback_chain() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/notes");
        then.status(401).json_body(json!({"code": "DB_RESET", "message": "reset"}));
    });

    let sync = coordinator(&server);
    let outcome = sync.load_notes(LoadOptions::new(ViewQuery::all()));
    assert_eq!(outcome.state, LoadState::Failed);
    assert_eq!(outcome.error.expect("error").kind, ErrorKind::SessionExpired);
    assert!(sync.api().state().token().is_none());

    sync.global().merge_by_id(&[Note::new("kept")]);
    let degraded = sync.load_notes(LoadOptions::new(ViewQuery::all()));
    assert_eq!(degraded.state, LoadState::Degraded);
    assert_eq!(ids(&degraded.notes), vec!["kept"]);
}

#[test]
fn remove_note_scrubs_local_state_and_forces_a_reload() {
    let server = MockServer::start();
    let starred = server.mock(|when, then| {
        when.method(GET).path("/api/notes/starred");
        then.status(200)
            .json_body(json!({"notes": [{"id": "n2", "starred": true}]}));
    });

    let sync = coordinator(&server);
    sync.global().merge_by_id(&[Note::new("n1"), Note::new("n2").starred(true)]);
    sync.cache().write(&ViewQuery::all(), &[Note::new("n1"), Note::new("n2")]);
    sync.cache().write(&ViewQuery::search("n"), &[Note::new("n1")]);

    sync.load_notes(LoadOptions::new(ViewQuery::starred()));
    let outcome = sync.remove_note("n1");

    starred.assert_hits(2);
    assert_eq!(outcome.state, LoadState::Success);
    assert!(sync.global().get("n1").is_none());
    let all = sync.cache().read(&ViewQuery::all()).expect("all view entry");
    assert_eq!(ids(&all.notes), vec!["n2"]);
    let search = sync.cache().read(&ViewQuery::search("n")).expect("search entry");
    assert!(search.notes.is_empty());
    assert_eq!(sync.last_query(), Some(ViewQuery::starred()));
}

#[test]
fn remove_in_a_fresh_session_reloads_with_the_saved_view_mode() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/notes").query_param("inTrash", "false");
        then.status(200).json_body(json!({"notes": [{"_id": "n2"}]}));
    });

    let sync = coordinator(&server);
    sync.api().state().set_view_mode("list");
    sync.global().merge_by_id(&[Note::new("n1"), Note::new("n2")]);

    let outcome = sync.remove_note("n1");

    let listed = ViewQuery {
        view_mode: Some(ViewMode::List),
        ..ViewQuery::all()
    };
    assert_eq!(outcome.query, listed);
    let cached = sync.cache().read(&listed).expect("cached under the saved mode");
    assert_eq!(ids(&cached.notes), vec!["n2"]);
}

#[test]
fn trash_and_restore_write_through_to_the_mirror() {
    let server = MockServer::start();
    let trash = server.mock(|when, then| {
        when.method(PUT).path("/api/notes/n1/trash");
        then.status(204);
    });
    let restore = server.mock(|when, then| {
        when.method(POST).path("/api/notes/n1/restore");
        then.status(200).json_body(json!({"success": true}));
    });

    let sync = coordinator(&server);
    sync.global().merge_by_id(&[Note::new("n1").starred(true)]);
    sync.cache().write(&ViewQuery::all(), &[Note::new("n1")]);
    let mut watcher = sync.watcher();

    let trashed = sync.trash_note("n1").expect("trash").expect("note in mirror");
    trash.assert_hits(1);
    assert!(trashed.in_trash);
    assert!(trashed.starred);
    assert!(trashed.deleted_at.is_some());
    assert!(sync.cache().read(&ViewQuery::all()).is_none());
    assert!(watcher.poll());

    let restored = sync.restore_note("n1").expect("restore").expect("note in mirror");
    restore.assert_hits(1);
    assert!(!restored.in_trash);
    assert!(restored.deleted_at.is_none());
    assert!(!sync.global().get("n1").expect("mirrored").in_trash);
    assert!(watcher.poll());
}

#[test]
fn toggle_star_trusts_a_returned_note() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(PUT).path("/api/notes/s1/star");
        then.status(200)
            .json_body(json!({"note": {"_id": "s1", "title": "S", "isStarred": true}}));
    });
    server.mock(|when, then| {
        when.method(PUT).path("/api/notes/s2/star");
        then.status(200).json_body(json!({"success": true}));
    });

    let sync = coordinator(&server);
    sync.global().merge_by_id(&[Note::new("s2").starred(true)]);

    let s1 = sync.toggle_star("s1").expect("star").expect("returned note");
    assert!(s1.starred);
    assert_eq!(sync.global().get("s1").expect("merged").title, "S");

    let s2 = sync.toggle_star("s2").expect("star").expect("mirrored note");
    assert!(!s2.starred);
}

#[test]
fn view_mode_is_validated_and_persisted() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/notes");
        then.status(200).json_body(json!({"notes": []}));
    });

    let sync = coordinator(&server);
    let err = sync.set_view_mode("tiles").expect_err("invalid mode");
    assert_eq!(err.kind, ErrorKind::Usage);

    let outcome = sync.set_view_mode("list").expect("valid mode");
    assert_eq!(outcome.query.view_mode, Some(ViewMode::List));
    assert_eq!(sync.view_mode(), Some(ViewMode::List));
}

#[test]
fn force_refresh_all_clears_every_cached_view() {
    let server = MockServer::start();
    let listing = server.mock(|when, then| {
        when.method(GET).path("/api/notes");
        then.status(200).json_body(json!({"notes": [{"id": "fresh"}]}));
    });

    let sync = coordinator(&server);
    sync.cache().write(&ViewQuery::search("x"), &[Note::new("stale")]);

    let outcome = sync.force_refresh_all();

    listing.assert_hits(1);
    assert_eq!(ids(&outcome.notes), vec!["fresh"]);
    assert!(sync.cache().read(&ViewQuery::search("x")).is_none());
    assert!(sync.cache().read(&ViewQuery::all()).is_some());
}
