use crate::config::{load_config, resolve_settings};
use crate::workspace::WorkspacePaths;
use jot_core::JotResult;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct DoctorCheck {
    pub name: String,
    pub ok: bool,
    pub details: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorReport {
    pub workspace: String,
    pub healthy: bool,
    pub checks: Vec<DoctorCheck>,
    pub server: Option<String>,
}

fn path_check(name: &str, ok: bool, path: &std::path::Path) -> DoctorCheck {
    DoctorCheck {
        name: name.to_string(),
        ok,
        details: path.display().to_string(),
    }
}

pub fn run_doctor(paths: &WorkspacePaths, server_override: Option<&str>) -> JotResult<DoctorReport> {
    let mut checks = vec![
        path_check("workspace_root", paths.root.is_dir(), &paths.root),
        path_check("jot_directory", paths.jot_dir.is_dir(), &paths.jot_dir),
        path_check("config_file", paths.config_path.is_file(), &paths.config_path),
        path_check(
            "state_db_file",
            paths.state_db_path.is_file(),
            &paths.state_db_path,
        ),
    ];

    let mut server = None;

    if paths.config_path.is_file() {
        match load_config(paths).and_then(|config| resolve_settings(&config, server_override)) {
            Ok(resolved) => {
                checks.push(DoctorCheck {
                    name: "server".to_string(),
                    ok: true,
                    details: format!(
                        "{} (cache ttl {}ms, refresh threshold {}ms)",
                        resolved.server, resolved.cache_ttl_ms, resolved.refresh_threshold_ms
                    ),
                });
                server = Some(resolved.server);
            }
            Err(err) => checks.push(DoctorCheck {
                name: "config_parse".to_string(),
                ok: false,
                details: err.message,
            }),
        }
    }

    let healthy = checks.iter().all(|check| check.ok);

    Ok(DoctorReport {
        workspace: paths.root.display().to_string(),
        healthy,
        checks,
        server,
    })
}
