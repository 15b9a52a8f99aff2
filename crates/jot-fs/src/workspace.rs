use crate::config::{DEFAULT_SERVER_URL, WorkspaceConfig, load_config, save_config};
use jot_core::{JotError, JotResult};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    pub root: PathBuf,
    pub jot_dir: PathBuf,
    pub config_path: PathBuf,
    pub state_db_path: PathBuf,
    pub export_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct WorkspaceInitResult {
    pub paths: WorkspacePaths,
    pub created: Vec<PathBuf>,
    pub updated: Vec<PathBuf>,
}

impl WorkspacePaths {
    pub fn from_root(root: PathBuf) -> Self {
        let jot_dir = root.join(".jot");

        Self {
            config_path: jot_dir.join("config.toml"),
            state_db_path: jot_dir.join("state.db"),
            export_dir: root.join("export"),
            root,
            jot_dir,
        }
    }
}

pub fn init_workspace(
    target: Option<&Path>,
    server: Option<&str>,
) -> JotResult<WorkspaceInitResult> {
    let root = match target {
        Some(path) => absolutize(path)?,
        None => std::env::current_dir().map_err(|err| {
            JotError::io(format!(
                "failed to resolve current directory for init: {err}"
            ))
        })?,
    };

    let paths = WorkspacePaths::from_root(root);
    let mut created = Vec::new();
    let mut updated = Vec::new();

    ensure_dir(&paths.root, &mut created)?;
    ensure_dir(&paths.jot_dir, &mut created)?;
    ensure_file(&paths.state_db_path, &mut created)?;

    if paths.config_path.exists() {
        let mut config = load_config(&paths)?;
        if let Some(server) = server
            && config.server != server
        {
            config.server = server.to_string();
            save_config(&paths, &config)?;
            updated.push(paths.config_path.clone());
        }
    } else {
        let config = WorkspaceConfig::with_server(server.unwrap_or(DEFAULT_SERVER_URL));
        save_config(&paths, &config)?;
        created.push(paths.config_path.clone());
    }

    Ok(WorkspaceInitResult {
        paths,
        created,
        updated,
    })
}

pub fn resolve_workspace(explicit: Option<&Path>) -> JotResult<WorkspacePaths> {
    let root = match explicit {
        Some(path) => absolutize(path)?,
        None => std::env::current_dir().map_err(|err| {
            JotError::io(format!(
                "failed to resolve current directory for workspace lookup: {err}"
            ))
        })?,
    };

    let paths = WorkspacePaths::from_root(root);
    if !paths.jot_dir.is_dir() {
        let root_display = paths.root.display();
        return Err(JotError::usage(format!(
            "workspace is not initialized at '{root_display}'; run `jot init --workspace {root_display}` first"
        )));
    }

    Ok(paths)
}

fn absolutize(path: &Path) -> JotResult<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }

    let cwd = std::env::current_dir().map_err(|err| {
        JotError::io(format!(
            "failed to resolve current directory for path: {err}"
        ))
    })?;

    Ok(cwd.join(path))
}

fn ensure_dir(path: &Path, created: &mut Vec<PathBuf>) -> JotResult<()> {
    if path.exists() {
        if !path.is_dir() {
            return Err(JotError::io(format!(
                "expected '{}' to be a directory",
                path.display()
            )));
        }
        return Ok(());
    }

    fs::create_dir_all(path).map_err(|err| {
        JotError::io(format!(
            "failed to create directory '{}': {}",
            path.display(),
            err
        ))
    })?;
    created.push(path.to_path_buf());
    Ok(())
}

fn ensure_file(path: &Path, created: &mut Vec<PathBuf>) -> JotResult<()> {
    if path.exists() {
        if !path.is_file() {
            return Err(JotError::io(format!(
                "expected '{}' to be a file",
                path.display()
            )));
        }
        return Ok(());
    }

    fs::write(path, []).map_err(|err| {
        JotError::io(format!(
            "failed to create file '{}': {}",
            path.display(),
            err
        ))
    })?;
    created.push(path.to_path_buf());
    Ok(())
}
