//! `pitwall config` — Print configuration.

use std::path::Path;

use pitwall_config::AppConfig;

use super::{config_path, load_config};

pub async fn run(path: Option<&Path>, show: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !show {
        println!("# Default configuration; save as {}", config_path(path).display());
        println!("{}", AppConfig::default_toml());
        return Ok(());
    }

    let config = load_config(path)?;
    let toml_str = toml::to_string_pretty(&config.redacted())?;
    println!("# Effective configuration (file + environment)");
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    #[test]
    fn config_path_is_valid() {
        let path = super::config_path(None);
        assert!(path.to_str().unwrap().ends_with("config.toml"));
        let custom = super::config_path(Some(std::path::Path::new("/srv/pitwall.toml")));
        assert_eq!(custom, std::path::PathBuf::from("/srv/pitwall.toml"));
    }
}
