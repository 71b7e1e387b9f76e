pub mod chat;
pub mod config_cmd;
pub mod doctor;
pub mod prompt;

use std::path::{Path, PathBuf};

use pitwall_config::AppConfig;

/// The config file a command reads: `--config` if given, else the default.
pub fn config_path(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = AppConfig::load_with_env(&config_path(path))
        .map_err(|e| format!("Failed to load config: {e}"))?;
    Ok(config)
}
