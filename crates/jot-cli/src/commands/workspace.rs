use jot_core::{ExitCode, JotResult};
use jot_fs::{init_workspace, resolve_workspace, run_doctor};
use jot_store::{LocalState, SqliteStore};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::{GlobalOptions, print_json, workspace_target, yes_no};

#[derive(Debug, Serialize)]
struct InitOutput {
    workspace: String,
    server: Option<String>,
    created: Vec<String>,
    updated: Vec<String>,
}

pub(crate) fn cmd_init(globals: &GlobalOptions) -> JotResult<ExitCode> {
    let target = workspace_target(globals)?;
    let result = init_workspace(Some(&target), globals.server.as_deref())?;

    let output = InitOutput {
        workspace: result.paths.root.display().to_string(),
        server: globals.server.clone(),
        created: result
            .created
            .iter()
            .map(|path| path.display().to_string())
            .collect(),
        updated: result
            .updated
            .iter()
            .map(|path| path.display().to_string())
            .collect(),
    };

    if globals.json {
        print_json(&json!({"ok": true, "result": output}))?;
    } else {
        println!("Workspace initialized: {}", output.workspace);
        if output.created.is_empty() {
            println!("Created: none");
        } else {
            println!("Created:");
            for path in &output.created {
                println!("  - {path}");
            }
        }
        if !output.updated.is_empty() {
            println!("Updated:");
            for path in &output.updated {
                println!("  - {path}");
            }
        }
    }

    Ok(ExitCode::Success)
}

pub(crate) fn cmd_doctor(globals: &GlobalOptions) -> JotResult<ExitCode> {
    let target = workspace_target(globals)?;
    let paths = resolve_workspace(Some(&target))?;
    let report = run_doctor(&paths, globals.server.as_deref())?;

    let state = LocalState::new(Arc::new(SqliteStore::from_workspace(&paths)?));
    let signed_in = state.token().is_some();
    let mirrored = state.global_notes().len();
    let cached_views = state.cache_keys().len();

    if globals.json {
        print_json(&json!({
            "ok": report.healthy,
            "result": {
                "workspace": report.workspace,
                "healthy": report.healthy,
                "checks": report.checks,
                "server": report.server,
                "signed_in": signed_in,
                "mirrored_notes": mirrored,
                "cached_views": cached_views,
            }
        }))?;
    } else {
        println!("Workspace: {}", report.workspace);
        println!(
            "Health: {}",
            if report.healthy { "healthy" } else { "degraded" }
        );
        for check in &report.checks {
            let prefix = if check.ok { "OK" } else { "FAIL" };
            println!("[{}] {} -> {}", prefix, check.name, check.details);
        }
        println!("Signed in: {}", yes_no(signed_in));
        println!("Mirrored notes: {mirrored}");
        println!("Cached views: {cached_views}");
    }

    Ok(if report.healthy {
        ExitCode::Success
    } else {
        ExitCode::Io
    })
}
