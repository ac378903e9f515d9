use std::sync::Arc;

use tracing::debug;

use crate::adapters::toml_config::{AppConfig, StorageBackend};
use crate::adapters::{FfmpegEngine, HttpStorage, LocalAssetResolver, LocalStorage};
use crate::app::{ArtifactPublisher, JobRegistry, RenderRunner};
use crate::compiler::EncoderPresets;
use crate::domain::errors::DomainError;
use crate::ports::{AssetPort, EnginePort, StoragePort};

pub trait AppContainer: Send + Sync {
    fn runner(&self) -> RenderRunner;
    fn assets(&self) -> Arc<dyn AssetPort>;
    fn engine(&self) -> Arc<dyn EnginePort>;
    fn presets(&self) -> &EncoderPresets;
}

pub struct DefaultAppContainer {
    runner: RenderRunner,
    assets: Arc<dyn AssetPort>,
    engine: Arc<dyn EnginePort>,
    presets: EncoderPresets,
}

impl DefaultAppContainer {
    pub fn new(config: &AppConfig) -> Result<Self, DomainError> {
        let resolver = LocalAssetResolver::new(&config.assets.font_dirs, config.assets.asset_dirs.clone());
        debug!(fonts = resolver.indexed_keys(), "font index built");
        let assets: Arc<dyn AssetPort> = Arc::new(resolver);

        let engine: Arc<dyn EnginePort> = Arc::new(FfmpegEngine::new(
            config.engine.binary.clone(),
            config.engine.diagnostic_tail_bytes,
        ));

        let storage: Arc<dyn StoragePort> = match config.storage.backend {
            StorageBackend::Local => Arc::new(LocalStorage::new(config.storage.local_root.clone())),
            StorageBackend::Http => {
                let endpoint = config.storage.endpoint.clone().ok_or_else(|| {
                    DomainError::PublishFailed("storage endpoint is not configured".to_string())
                })?;
                Arc::new(HttpStorage::new(endpoint, config.storage.token.clone())?)
            }
        };

        let publisher = Arc::new(ArtifactPublisher::new(storage, config.publish_settings()));
        let registry = Arc::new(JobRegistry::new());

        let runner = RenderRunner::new(
            Arc::clone(&assets),
            Arc::clone(&engine),
            publisher,
            registry,
            config.runner_settings(),
        );

        Ok(Self {
            runner,
            assets,
            engine,
            presets: config.presets(),
        })
    }
}

impl AppContainer for DefaultAppContainer {
    fn runner(&self) -> RenderRunner {
        self.runner.clone()
    }

    fn assets(&self) -> Arc<dyn AssetPort> {
        Arc::clone(&self.assets)
    }

    fn engine(&self) -> Arc<dyn EnginePort> {
        Arc::clone(&self.engine)
    }

    fn presets(&self) -> &EncoderPresets {
        &self.presets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_http_backend_needs_endpoint() {
        let mut config = AppConfig::default();
        config.storage.backend = StorageBackend::Http;
        assert!(matches!(
            DefaultAppContainer::new(&config),
            Err(DomainError::PublishFailed(_))
        ));
    }

    #[test]
    fn test_container_uses_configured_presets() {
        let temp = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.assets.font_dirs = vec![temp.path().to_path_buf()];
        config.engine.final_crf = 20;

        let container = DefaultAppContainer::new(&config).unwrap();
        assert_eq!(container.presets().final_cut.crf, 20);
        assert_eq!(container.runner().settings().presets.final_cut.crf, 20);
    }
}
