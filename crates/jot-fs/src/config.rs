use crate::workspace::WorkspacePaths;
use jot_core::{JotError, JotResult};
use serde::{Deserialize, Serialize};
use std::fs;

pub const CONFIG_VERSION: u32 = 1;
pub const DEFAULT_SERVER_URL: &str = "http://localhost:3000";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_REFRESH_THRESHOLD_SECS: u64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub server: String,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_refresh_threshold")]
    pub refresh_threshold_secs: u64,
}

/// Effective settings after command-line overrides are applied.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedSettings {
    pub server: String,
    pub cache_ttl_ms: i64,
    pub refresh_threshold_ms: i64,
}

impl WorkspaceConfig {
    pub fn with_server(server: impl Into<String>) -> Self {
        Self {
            version: CONFIG_VERSION,
            server: server.into(),
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            refresh_threshold_secs: DEFAULT_REFRESH_THRESHOLD_SECS,
        }
    }

    pub fn ensure_defaults(&mut self) {
        if self.version == 0 {
            self.version = CONFIG_VERSION;
        }

        if self.server.trim().is_empty() {
            self.server = DEFAULT_SERVER_URL.to_string();
        }
    }
}

fn default_cache_ttl() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

fn default_refresh_threshold() -> u64 {
    DEFAULT_REFRESH_THRESHOLD_SECS
}

pub fn load_config(paths: &WorkspacePaths) -> JotResult<WorkspaceConfig> {
    let contents = fs::read_to_string(&paths.config_path).map_err(|err| {
        JotError::io(format!(
            "failed to read workspace config '{}': {}",
            paths.config_path.display(),
            err
        ))
    })?;

    let mut config: WorkspaceConfig = toml::from_str(&contents).map_err(|err| {
        JotError::io(format!(
            "failed to parse workspace config '{}': {}",
            paths.config_path.display(),
            err
        ))
    })?;
    config.ensure_defaults();
    Ok(config)
}

pub fn save_config(paths: &WorkspacePaths, config: &WorkspaceConfig) -> JotResult<()> {
    let serialized = toml::to_string_pretty(config)
        .map_err(|err| JotError::io(format!("failed to encode config.toml: {err}")))?;

    fs::write(&paths.config_path, serialized).map_err(|err| {
        JotError::io(format!(
            "failed to write workspace config '{}': {}",
            paths.config_path.display(),
            err
        ))
    })
}

pub fn resolve_settings(
    config: &WorkspaceConfig,
    server_override: Option<&str>,
) -> JotResult<ResolvedSettings> {
    let server = server_override
        .unwrap_or(config.server.as_str())
        .trim()
        .trim_end_matches('/')
        .to_string();

    if !(server.starts_with("http://") || server.starts_with("https://")) {
        return Err(JotError::usage(format!(
            "server '{server}' must be an http:// or https:// URL"
        )));
    }

    Ok(ResolvedSettings {
        server,
        cache_ttl_ms: secs_to_ms(config.cache_ttl_secs),
        refresh_threshold_ms: secs_to_ms(config.refresh_threshold_secs),
    })
}

fn secs_to_ms(secs: u64) -> i64 {
    i64::try_from(secs.saturating_mul(1000)).unwrap_or(i64::MAX)
}
