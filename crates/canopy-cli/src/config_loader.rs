//! Configuration loading utilities for CLI commands

use anyhow::{Context, Result};
use canopy_core::config::{CliConfigOverrides, LayeredConfig};
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when `--config` is absent
const DEFAULT_CONFIG_FILE: &str = "canopy.toml";

/// Load layered configuration: defaults, then the config file, then the environment
pub fn load_config(config_path: Option<&Path>) -> Result<LayeredConfig> {
    let config = LayeredConfig::with_defaults();

    let config = match resolve_config_path(config_path) {
        Some(path) => config
            .load_from_file(&path)
            .with_context(|| format!("Failed to load configuration file {}", path.display()))?,
        None => config,
    };

    Ok(config.load_from_env())
}

/// Load layered configuration with CLI overrides
pub fn load_config_with_overrides(
    config_path: Option<&Path>,
    overrides: CliConfigOverrides,
) -> Result<LayeredConfig> {
    let mut config = load_config(config_path)?;
    config.update_from_cli(overrides);
    Ok(config)
}

/// An explicit path must exist; the default file is optional
fn resolve_config_path(config_path: Option<&Path>) -> Option<PathBuf> {
    match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            default.is_file().then_some(default)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_core::config::ConfigSource;
    use canopy_core::models::ScopeKey;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_explicit_file_is_loaded() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "footprint_size_m = 20.0").unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.footprint_size_m.value, 20.0);
        assert_eq!(config.footprint_size_m.source, ConfigSource::File);
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let err = load_config(Some(Path::new("/nonexistent/canopy.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to load configuration file"));
    }

    #[test]
    fn test_cli_beats_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "scope_key = \"owner\"").unwrap();

        let overrides = CliConfigOverrides {
            scope_key: Some(ScopeKey::None),
            ..Default::default()
        };
        let config = load_config_with_overrides(Some(file.path()), overrides).unwrap();

        assert_eq!(config.scope_key.value, ScopeKey::None);
        assert_eq!(config.scope_key.source, ConfigSource::Cli);
    }
}
