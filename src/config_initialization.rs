//! Configuration initialization and hierarchy management

use std::path::{Path, PathBuf};

use crate::adapters::toml_config::AppConfig;
use crate::error::{ReelgenError, ReelgenResult};

/// Files tried in order when no config file is given explicitly
pub const CONFIG_SEARCH_PATHS: &[&str] = &["reelgen.toml", "config/reelgen.toml"];

/// Values supplied on the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    pub log_level: Option<String>,
    pub json_logs: bool,
    pub timeout_secs: Option<u64>,
}

/// Effective configuration and the file it came from
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedConfig {
    pub config: AppConfig,
    pub source: Option<PathBuf>,
}

/// Build the configuration following precedence: CLI > Env > File > Defaults
pub fn initialize_configuration(
    explicit: Option<&Path>,
    overrides: &CliOverrides,
) -> ReelgenResult<LoadedConfig> {
    initialize_with(explicit, overrides, |name| std::env::var(name).ok())
}

/// Same as [`initialize_configuration`] with an injectable environment
pub fn initialize_with<F>(
    explicit: Option<&Path>,
    overrides: &CliOverrides,
    env: F,
) -> ReelgenResult<LoadedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let source = match explicit {
        Some(path) if path.is_file() => Some(path.to_path_buf()),
        Some(path) => {
            return Err(ReelgenError::Config(format!(
                "Config file does not exist: {}",
                path.display()
            )))
        }
        None => CONFIG_SEARCH_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.is_file()),
    };

    let mut config = match &source {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    config.apply_env(env)?;
    apply_cli_overrides(&mut config, overrides);
    config.validate()?;

    Ok(LoadedConfig { config, source })
}

fn apply_cli_overrides(config: &mut AppConfig, overrides: &CliOverrides) {
    if let Some(level) = &overrides.log_level {
        config.logging.level = level.clone();
    }
    if overrides.json_logs {
        config.logging.json = true;
    }
    if let Some(timeout) = overrides.timeout_secs {
        config.engine.timeout_secs = Some(timeout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_precedence_cli_over_env_over_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("reelgen.toml");
        std::fs::write(
            &path,
            "[engine]\ntimeout_secs = 60\n[logging]\nlevel = \"warn\"\n[runner]\noutput_dir = \"out\"\n",
        )
        .unwrap();

        let overrides = CliOverrides {
            log_level: Some("debug".to_string()),
            json_logs: false,
            timeout_secs: None,
        };
        let env = |name: &str| match name {
            "REELGEN_ENGINE_TIMEOUT_SECS" => Some("90".to_string()),
            "REELGEN_LOG_LEVEL" => Some("error".to_string()),
            _ => None,
        };
        let loaded = initialize_with(Some(&path), &overrides, env).unwrap();

        assert_eq!(loaded.source.as_deref(), Some(path.as_path()));
        assert_eq!(loaded.config.engine.timeout_secs, Some(90));
        assert_eq!(loaded.config.logging.level, "debug");
        assert_eq!(loaded.config.runner.output_dir, PathBuf::from("out"));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = initialize_with(
            Some(Path::new("/nonexistent/reelgen.toml")),
            &CliOverrides::default(),
            |_| None,
        );
        assert!(matches!(result, Err(ReelgenError::Config(_))));
    }
}
