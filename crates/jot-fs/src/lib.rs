mod config;
mod doctor;
mod workspace;

pub use config::{
    DEFAULT_CACHE_TTL_SECS, DEFAULT_REFRESH_THRESHOLD_SECS, DEFAULT_SERVER_URL, ResolvedSettings,
    WorkspaceConfig, load_config, resolve_settings, save_config,
};
pub use doctor::{DoctorCheck, DoctorReport, run_doctor};
pub use workspace::{WorkspaceInitResult, WorkspacePaths, init_workspace, resolve_workspace};
