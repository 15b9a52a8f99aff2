mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use jot_api::ApiClient;
use jot_core::{ExitCode, JotError, JotResult};
use jot_fs::{
    ResolvedSettings, WorkspacePaths, init_workspace, load_config, resolve_settings,
    resolve_workspace,
};
use jot_store::{LocalState, SqliteStore};
use jot_sync::SyncCoordinator;
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "jot",
    version,
    about = "Offline-tolerant notes client with a local cache",
    arg_required_else_help = true
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    workspace: Option<PathBuf>,

    #[arg(long, global = true)]
    server: Option<String>,

    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    no_color: bool,

    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Init,
    Doctor,
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },
    Notes {
        #[command(subcommand)]
        command: NotesCommand,
    },
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
}

#[derive(Debug, Subcommand)]
enum AuthCommand {
    /// Signs in; the password is read from JOT_PASSWORD.
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        remember: bool,
    },
    Status,
    Refresh,
    Logout,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ExportFormatArg {
    Markdown,
    Html,
}

#[derive(Debug, Subcommand)]
enum NotesCommand {
    List {
        #[arg(long, conflicts_with_all = ["starred", "shared"])]
        trash: bool,
        #[arg(long)]
        starred: bool,
        #[arg(long)]
        shared: bool,
        #[arg(long, value_name = "ID")]
        category: Option<String>,
        #[arg(long, value_name = "ID")]
        tag: Option<String>,
        #[arg(long, value_name = "QUERY")]
        search: Option<String>,
        #[arg(long, value_name = "ID")]
        exclude_category: Option<String>,
        #[arg(long)]
        refresh: bool,
    },
    /// Persists the grid/list preference and reloads the default view.
    View {
        mode: String,
    },
    Remove {
        id: String,
    },
    Trash {
        id: String,
    },
    Restore {
        id: String,
    },
    Star {
        id: String,
    },
    Export {
        dir: Option<PathBuf>,
        #[arg(long, value_enum, default_value = "markdown")]
        format: ExportFormatArg,
        #[arg(long)]
        no_trash: bool,
        #[arg(long)]
        no_metadata: bool,
    },
}

#[derive(Debug, Subcommand)]
enum CacheCommand {
    Clear,
    Status,
}

#[derive(Debug, Clone)]
struct GlobalOptions {
    workspace: Option<PathBuf>,
    server: Option<String>,
    json: bool,
}

#[derive(Debug)]
struct SyncContext {
    paths: WorkspacePaths,
    settings: ResolvedSettings,
    state: LocalState,
    sync: SyncCoordinator,
}

fn main() {
    let cli = Cli::parse();
    configure_logging(cli.debug, cli.json, cli.no_color);

    let globals = GlobalOptions {
        workspace: cli.workspace,
        server: cli.server,
        json: cli.json,
    };

    let result = run_command(cli.command, &globals);

    let exit = match result {
        Ok(code) => code,
        Err(error) => {
            render_error(&error, globals.json);
            error.exit_code()
        }
    };

    std::process::exit(exit.as_i32());
}

fn configure_logging(debug: bool, json: bool, no_color: bool) {
    let default_filter = if debug { "debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_ansi(false)
            .with_target(false)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_ansi(!no_color)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn run_command(command: Command, globals: &GlobalOptions) -> JotResult<ExitCode> {
    match command {
        Command::Init => commands::workspace::cmd_init(globals),
        Command::Doctor => commands::workspace::cmd_doctor(globals),
        Command::Auth { command } => commands::auth::cmd_auth(command, globals),
        Command::Notes { command } => commands::notes::cmd_notes(command, globals),
        Command::Cache { command } => commands::cache::cmd_cache(command, globals),
    }
}

fn with_sync_context<F>(globals: &GlobalOptions, run: F) -> JotResult<ExitCode>
where
    F: FnOnce(SyncContext) -> JotResult<ExitCode>,
{
    let target = workspace_target(globals)?;
    if !target.join(".jot").is_dir() {
        init_workspace(Some(&target), globals.server.as_deref())?;
    }

    let paths = resolve_workspace(Some(&target))?;
    let config = load_config(&paths)?;
    let settings = resolve_settings(&config, globals.server.as_deref())?;

    let store = SqliteStore::from_workspace(&paths)?;
    let state = LocalState::new(Arc::new(store));
    let api =
        ApiClient::with_refresh_threshold(&settings.server, state.clone(), settings.refresh_threshold_ms)?;
    let sync = SyncCoordinator::new(api, settings.cache_ttl_ms);

    run(SyncContext {
        paths,
        settings,
        state,
        sync,
    })
}

fn workspace_target(globals: &GlobalOptions) -> JotResult<PathBuf> {
    match &globals.workspace {
        Some(path) => absolutize(path),
        None => current_dir(),
    }
}

fn absolutize(path: &Path) -> JotResult<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(current_dir()?.join(path))
}

fn current_dir() -> JotResult<PathBuf> {
    std::env::current_dir()
        .map_err(|err| JotError::io(format!("failed to resolve current directory: {err}")))
}

fn render_error(error: &JotError, json_output: bool) {
    if json_output {
        let payload = json!({
            "ok": false,
            "error": {
                "kind": error.kind,
                "message": &error.message,
                "status": error.status,
            }
        });
        let serialized = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| {
            "{\"ok\":false,\"error\":{\"kind\":\"io\",\"message\":\"failed to serialize error\"}}".to_string()
        });
        eprintln!("{serialized}");
    } else {
        eprintln!("error: {}", error.message);
    }
}

fn print_json<T: Serialize>(value: &T) -> JotResult<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| JotError::io(format!("failed to render JSON output: {err}")))?;
    println!("{rendered}");
    Ok(())
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}
