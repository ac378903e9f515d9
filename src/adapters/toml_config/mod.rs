// TOML config adapter - Typed configuration from files and environment

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::adapters::tracing_log::LogOptions;
use crate::app::publisher::PublishSettings;
use crate::app::render_runner::{default_concurrency, RunnerSettings};
use crate::compiler::{EncoderPresets, EncoderQuality};
use crate::error::{ReelgenError, ReelgenResult};

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "REELGEN_";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub runner: RunnerConfig,
    pub assets: AssetsConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Engine binary name or path
    pub binary: PathBuf,
    /// Per-job render time limit; unset means no limit
    pub timeout_secs: Option<u64>,
    /// Bytes of engine diagnostics kept for failure details
    pub diagnostic_tail_bytes: usize,
    pub preview_preset: String,
    pub preview_crf: u8,
    pub final_preset: String,
    pub final_crf: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let presets = EncoderPresets::default();
        Self {
            binary: PathBuf::from("ffmpeg"),
            timeout_secs: None,
            diagnostic_tail_bytes: 4096,
            preview_preset: presets.preview.preset,
            preview_crf: presets.preview.crf,
            final_preset: presets.final_cut.preset,
            final_crf: presets.final_cut.crf,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    pub max_concurrent_jobs: usize,
    pub output_dir: PathBuf,
    pub poll_interval_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_concurrency(),
            output_dir: PathBuf::from("renders"),
            poll_interval_ms: 250,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssetsConfig {
    pub font_dirs: Vec<PathBuf>,
    /// Roots searched for relative media sources; empty means the working directory
    pub asset_dirs: Vec<PathBuf>,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            font_dirs: vec![PathBuf::from("fonts")],
            asset_dirs: vec![PathBuf::from("assets")],
        }
    }
}

/// Object storage implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Directory tree on the local filesystem
    #[default]
    Local,
    /// HTTP PUT endpoint
    Http,
}

impl StorageBackend {
    pub fn parse(value: &str) -> ReelgenResult<Self> {
        match value.to_lowercase().as_str() {
            "local" => Ok(StorageBackend::Local),
            "http" => Ok(StorageBackend::Http),
            _ => Err(ReelgenError::Config(format!(
                "Invalid storage backend: {}. Valid backends: local, http",
                value
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub bucket: String,
    pub public_base_url: String,
    pub key_prefix: String,
    /// Root directory of the local backend
    pub local_root: PathBuf,
    /// Base URL of the HTTP backend
    pub endpoint: Option<String>,
    /// Bearer token of the HTTP backend
    pub token: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            bucket: "media".to_string(),
            public_base_url: "http://localhost:8000/media".to_string(),
            key_prefix: "renders".to_string(),
            local_root: PathBuf::from("published"),
            endpoint: None,
            token: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Parse configuration from TOML text; missing keys keep their defaults
    pub fn from_toml_str(content: &str) -> ReelgenResult<Self> {
        toml::from_str(content)
            .map_err(|e| ReelgenError::Config(format!("Failed to parse TOML config: {}", e)))
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> ReelgenResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ReelgenError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Apply `REELGEN_*` overrides read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> ReelgenResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(v) = var("ENGINE_BINARY") {
            self.engine.binary = PathBuf::from(v);
        }
        if let Some(v) = var("ENGINE_TIMEOUT_SECS") {
            self.engine.timeout_secs = Some(parse_number("ENGINE_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = var("MAX_CONCURRENT_JOBS") {
            self.runner.max_concurrent_jobs = parse_number("MAX_CONCURRENT_JOBS", &v)?;
        }
        if let Some(v) = var("OUTPUT_DIR") {
            self.runner.output_dir = PathBuf::from(v);
        }
        if let Some(v) = var("FONT_DIRS") {
            self.assets.font_dirs = std::env::split_paths(&OsString::from(v)).collect();
        }
        if let Some(v) = var("ASSET_DIRS") {
            self.assets.asset_dirs = std::env::split_paths(&OsString::from(v)).collect();
        }
        if let Some(v) = var("STORAGE_BACKEND") {
            self.storage.backend = StorageBackend::parse(&v)?;
        }
        if let Some(v) = var("STORAGE_BUCKET") {
            self.storage.bucket = v;
        }
        if let Some(v) = var("PUBLIC_BASE_URL") {
            self.storage.public_base_url = v;
        }
        if let Some(v) = var("KEY_PREFIX") {
            self.storage.key_prefix = v;
        }
        if let Some(v) = var("STORAGE_ROOT") {
            self.storage.local_root = PathBuf::from(v);
        }
        if let Some(v) = var("STORAGE_ENDPOINT") {
            self.storage.endpoint = Some(v);
        }
        if let Some(v) = var("STORAGE_TOKEN") {
            self.storage.token = Some(v);
        }
        if let Some(v) = var("LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = var("LOG_JSON") {
            self.logging.json = matches!(v.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        Ok(())
    }

    /// Reject configurations the runner cannot work with
    pub fn validate(&self) -> ReelgenResult<()> {
        if self.runner.max_concurrent_jobs == 0 {
            return Err(ReelgenError::Config(
                "runner.max_concurrent_jobs must be at least 1".to_string(),
            ));
        }
        if self.engine.diagnostic_tail_bytes == 0 {
            return Err(ReelgenError::Config(
                "engine.diagnostic_tail_bytes must be positive".to_string(),
            ));
        }
        if self.engine.timeout_secs == Some(0) {
            return Err(ReelgenError::Config(
                "engine.timeout_secs must be positive when set".to_string(),
            ));
        }
        for (name, crf) in [("preview", self.engine.preview_crf), ("final", self.engine.final_crf)] {
            if crf > 51 {
                return Err(ReelgenError::Config(format!(
                    "engine.{}_crf must lie in 0..=51",
                    name
                )));
            }
        }
        if self.storage.bucket.trim().is_empty() || self.storage.public_base_url.trim().is_empty() {
            return Err(ReelgenError::Config(
                "storage.bucket and storage.public_base_url are required".to_string(),
            ));
        }
        if self.storage.backend == StorageBackend::Http && self.storage.endpoint.is_none() {
            return Err(ReelgenError::Config(
                "storage.endpoint is required for the http backend".to_string(),
            ));
        }
        Ok(())
    }

    pub fn presets(&self) -> EncoderPresets {
        EncoderPresets {
            preview: EncoderQuality {
                preset: self.engine.preview_preset.clone(),
                crf: self.engine.preview_crf,
            },
            final_cut: EncoderQuality {
                preset: self.engine.final_preset.clone(),
                crf: self.engine.final_crf,
            },
        }
    }

    pub fn runner_settings(&self) -> RunnerSettings {
        RunnerSettings {
            output_dir: self.runner.output_dir.clone(),
            max_concurrent_jobs: self.runner.max_concurrent_jobs,
            timeout: self.engine.timeout_secs.map(Duration::from_secs),
            diagnostic_tail_bytes: self.engine.diagnostic_tail_bytes,
            presets: self.presets(),
        }
    }

    pub fn publish_settings(&self) -> PublishSettings {
        PublishSettings {
            bucket: self.storage.bucket.clone(),
            public_base_url: self.storage.public_base_url.clone(),
            key_prefix: self.storage.key_prefix.clone(),
        }
    }

    pub fn log_options(&self) -> LogOptions {
        LogOptions {
            level: self.logging.level.clone(),
            json: self.logging.json,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.runner.poll_interval_ms.max(1))
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> ReelgenResult<T> {
    value.trim().parse().map_err(|_| {
        ReelgenError::Config(format!("{}{} must be a number, got '{}'", ENV_PREFIX, name, value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [engine]
            timeout_secs = 120

            [storage]
            backend = "http"
            endpoint = "https://store.example.com"
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.timeout_secs, Some(120));
        assert_eq!(config.engine.binary, PathBuf::from("ffmpeg"));
        assert_eq!(config.storage.backend, StorageBackend::Http);
        assert_eq!(config.storage.bucket, "media");
        assert!(config.validate().is_ok());
        assert_eq!(
            config.runner_settings().timeout,
            Some(Duration::from_secs(120))
        );
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(AppConfig::from_toml_str("[engine]\nthreads = 4\n").is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let vars: HashMap<&str, &str> = [
            ("REELGEN_MAX_CONCURRENT_JOBS", "3"),
            ("REELGEN_STORAGE_BACKEND", "local"),
            ("REELGEN_PUBLIC_BASE_URL", "https://cdn.example.com"),
            ("REELGEN_LOG_JSON", "true"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::from_toml_str("[runner]\nmax_concurrent_jobs = 8\n").unwrap();
        config
            .apply_env(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.runner.max_concurrent_jobs, 3);
        assert_eq!(config.storage.public_base_url, "https://cdn.example.com");
        assert!(config.logging.json);
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = AppConfig::default();
        let result = config.apply_env(|name| {
            (name == "REELGEN_ENGINE_TIMEOUT_SECS").then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(ReelgenError::Config(_))));
    }

    #[test]
    fn test_validation() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_ok());

        config.storage.backend = StorageBackend::Http;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.engine.final_crf = 60;
        assert!(config.validate().is_err());
    }
}
