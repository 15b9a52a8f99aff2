use assert_cmd::Command;
use httpmock::Method::{GET, POST, PUT};
use httpmock::MockServer;
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[test]
fn init_then_doctor_reports_a_healthy_workspace() {
    let server = MockServer::start();
    let workspace = temp_workspace();
    init_workspace(&workspace.path, &server.base_url());

    let payload = run_json(&workspace.path, &["doctor", "--json"]);
    assert_eq!(payload["ok"], true);
    assert_eq!(payload["result"]["healthy"], true);
    assert_eq!(payload["result"]["server"], server.base_url());
    assert_eq!(payload["result"]["signed_in"], false);
}

#[test]
fn login_persists_the_token_for_later_commands() {
    let server = MockServer::start();
    let workspace = temp_workspace();

    let login = server.mock(|when, then| {
        when.method(POST)
            .path("/api/auth/login")
            .json_body(json!({"username": "ada", "password": "pw-123", "remember": false}));
        then.status(200).json_body(json!({
            "success": true,
            "token": "issued",
            "user": {"id": "u1", "username": "ada"}
        }));
    });
    let me = server.mock(|when, then| {
        when.method(GET)
            .path("/api/auth/me")
            .header("authorization", "Bearer issued");
        then.status(200)
            .json_body(json!({"success": true, "user": {"id": "u1", "username": "ada"}}));
    });

    init_workspace(&workspace.path, &server.base_url());

    let mut cmd = base_command(&workspace.path);
    cmd.args(["auth", "login", "--username", "ada", "--json"])
        .env("JOT_PASSWORD", "pw-123");
    let login_json = stdout_json(cmd.assert().success().get_output());
    assert_eq!(login_json["ok"], true);
    assert_eq!(login_json["result"]["user"]["username"], "ada");

    let status = run_json(&workspace.path, &["auth", "status", "--json"]);
    assert_eq!(status["result"]["authenticated"], true);
    assert_eq!(status["result"]["user"]["username"], "ada");

    login.assert_hits(1);
    me.assert_hits(1);
}

#[test]
fn login_without_password_is_a_usage_error() {
    let server = MockServer::start();
    let workspace = temp_workspace();
    init_workspace(&workspace.path, &server.base_url());

    let mut cmd = base_command(&workspace.path);
    cmd.args(["auth", "login", "--username", "ada", "--json"]);
    let assert = cmd.assert().code(2);
    let payload = stderr_json(assert.get_output());
    assert_eq!(payload["error"]["kind"], "usage");
}

#[test]
fn status_without_token_exits_with_auth_code() {
    let server = MockServer::start();
    let workspace = temp_workspace();
    init_workspace(&workspace.path, &server.base_url());

    let mut cmd = base_command(&workspace.path);
    cmd.args(["auth", "status", "--json"]);
    let payload = stdout_json(cmd.assert().code(3).get_output());
    assert_eq!(payload["ok"], false);
    assert_eq!(payload["result"]["authenticated"], false);
    assert_eq!(payload["result"]["reason"], "no stored token");
}

#[test]
fn rejected_refresh_leaves_an_expiration_for_status() {
    let server = MockServer::start();
    let workspace = temp_workspace();

    server.mock(|when, then| {
        when.method(POST).path("/api/auth/login");
        then.status(200).json_body(json!({
            "success": true,
            "token": "issued",
            "user": {"id": "u1", "username": "ada"}
        }));
    });
    let refresh = server.mock(|when, then| {
        when.method(POST)
            .path("/api/auth/refresh-token")
            .header("authorization", "Bearer issued");
        then.status(401).json_body(json!({"message": "refresh token revoked"}));
    });

    init_workspace(&workspace.path, &server.base_url());
    fs::write(
        workspace.path.join(".jot").join("config.toml"),
        format!(
            "version = 1\nserver = \"{}\"\nrefresh_threshold_secs = 0\n",
            server.base_url()
        ),
    )
    .expect("write config");

    let mut login = base_command(&workspace.path);
    login
        .args(["auth", "login", "--username", "ada", "--json"])
        .env("JOT_PASSWORD", "pw-123");
    login.assert().success();

    let mut cmd = base_command(&workspace.path);
    cmd.args(["auth", "refresh", "--json"]);
    let payload = stderr_json(cmd.assert().code(3).get_output());
    assert_eq!(payload["error"]["kind"], "session_expired");
    refresh.assert_hits(1);

    let mut cmd = base_command(&workspace.path);
    cmd.args(["auth", "status", "--json"]);
    let status = stdout_json(cmd.assert().code(3).get_output());
    assert_eq!(status["result"]["authenticated"], false);
    assert_eq!(status["result"]["expiration"]["reason"], "auth_expired");
    assert_eq!(
        status["result"]["reason"],
        "token refresh was rejected; sign in again"
    );
}

#[test]
fn listing_is_cached_and_survives_an_outage() {
    let server = MockServer::start();
    let workspace = temp_workspace();
    init_workspace(&workspace.path, &server.base_url());

    let mut online = server.mock(|when, then| {
        when.method(GET).path("/api/notes").query_param("inTrash", "false");
        then.status(200).json_body(json!({"notes": [
            {"_id": "n1", "title": "First"},
            {"_id": "n2", "title": "Second", "isStarred": true}
        ]}));
    });

    let first = run_json(&workspace.path, &["notes", "list", "--json"]);
    assert_eq!(first["result"]["state"], "success");
    assert_eq!(first["result"]["source"], "network");
    assert_eq!(first["result"]["count"], 2);

    let cached = run_json(&workspace.path, &["notes", "list", "--json"]);
    assert_eq!(cached["result"]["source"], "cache");
    online.assert_hits(1);
    online.delete();

    server.mock(|when, then| {
        when.method(GET).path("/api/notes");
        then.status(500).json_body(json!({"message": "down"}));
    });

    let degraded = run_json(&workspace.path, &["notes", "list", "--refresh", "--json"]);
    assert_eq!(degraded["result"]["state"], "degraded");
    assert_eq!(degraded["result"]["source"], "cache_fallback");
    assert_eq!(degraded["result"]["count"], 2);

    let starred = run_json(&workspace.path, &["notes", "list", "--starred", "--json"]);
    assert_eq!(starred["result"]["state"], "degraded");
    assert_eq!(starred["result"]["notes"][0]["id"], "n2");
}

#[test]
fn failed_load_with_no_local_data_exits_with_remote_code() {
    let server = MockServer::start();
    let workspace = temp_workspace();
    init_workspace(&workspace.path, &server.base_url());

    server.mock(|when, then| {
        when.method(GET).path("/api/notes");
        then.status(500).json_body(json!({"error": "database unavailable"}));
    });

    let mut cmd = base_command(&workspace.path);
    cmd.args(["notes", "list", "--json"]);
    let payload = stderr_json(cmd.assert().code(4).get_output());
    assert_eq!(payload["ok"], false);
    assert_eq!(payload["error"]["kind"], "server");
    assert_eq!(payload["error"]["status"], 500);
    assert!(
        payload["error"]["message"]
            .as_str()
            .expect("message")
            .contains("database unavailable")
    );
}

#[test]
fn trash_writes_through_and_export_renders_the_mirror() {
    let server = MockServer::start();
    let workspace = temp_workspace();
    init_workspace(&workspace.path, &server.base_url());

    server.mock(|when, then| {
        when.method(GET).path("/api/notes").query_param("inTrash", "false");
        then.status(200).json_body(json!({"notes": [
            {"_id": "n1", "title": "Shopping list", "content": "<ul><li>milk</li></ul>"}
        ]}));
    });
    let trash = server.mock(|when, then| {
        when.method(PUT).path("/api/notes/n1/trash");
        then.status(204);
    });

    run_json(&workspace.path, &["notes", "list", "--json"]);
    let trashed = run_json(&workspace.path, &["notes", "trash", "n1", "--json"]);
    trash.assert_hits(1);
    assert_eq!(trashed["result"]["note"]["inTrash"], true);
    assert!(trashed["result"]["note"]["deletedAt"].is_string());

    let status = run_json(&workspace.path, &["cache", "status", "--json"]);
    assert_eq!(status["result"]["views"], json!([]));
    assert_eq!(status["result"]["mirrored_notes"], 1);

    let export_dir = workspace.path.join("out");
    let export = run_json(
        &workspace.path,
        &["notes", "export", export_dir.to_str().expect("export path"), "--json"],
    );
    assert_eq!(export["result"]["exported"], 1);
    let rendered =
        fs::read_to_string(export_dir.join("n1_shopping-list.md")).expect("exported note");
    assert!(rendered.contains("inTrash: true"));
    assert!(rendered.contains("- milk"));
    assert!(export_dir.join("README.txt").is_file());

    let mut cmd = base_command(&workspace.path);
    cmd.args(["notes", "export", "--no-trash", "--json"]);
    cmd.assert().code(2);
}

#[test]
fn invalid_view_mode_is_rejected() {
    let server = MockServer::start();
    let workspace = temp_workspace();
    init_workspace(&workspace.path, &server.base_url());

    let mut cmd = base_command(&workspace.path);
    cmd.args(["notes", "view", "tiles", "--json"]);
    cmd.assert().code(2);
}

fn init_workspace(workspace: &Path, server_url: &str) {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("jot");
    cmd.args([
        "init",
        "--workspace",
        workspace.to_str().expect("workspace path"),
        "--server",
        server_url,
        "--json",
    ]);

    cmd.assert().success();
}

fn run_json(workspace: &Path, args: &[&str]) -> Value {
    let mut cmd = base_command(workspace);
    cmd.args(args);
    stdout_json(cmd.assert().success().get_output())
}

fn stdout_json(output: &std::process::Output) -> Value {
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    serde_json::from_str(&stdout).expect("json stdout")
}

fn stderr_json(output: &std::process::Output) -> Value {
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    serde_json::from_str(&stderr).expect("json stderr")
}

fn base_command(workspace: &Path) -> Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("jot");
    cmd.current_dir(workspace)
        .env_remove("JOT_PASSWORD")
        .env("RUST_LOG", "off")
        .args(["--workspace", workspace.to_str().expect("workspace path")]);
    cmd
}

#[derive(Debug)]
struct TestWorkspace {
    _temp: TempDir,
    path: PathBuf,
}

fn temp_workspace() -> TestWorkspace {
    let temp = tempfile::tempdir().expect("tempdir");
    let workspace_path = temp.path().join("workspace");
    fs::create_dir_all(&workspace_path).expect("create workspace dir");
    TestWorkspace {
        _temp: temp,
        path: workspace_path,
    }
}
