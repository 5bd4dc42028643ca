use analysis::{AnalysisCache, AnalysisClient, RefreshCoordinator, VersionGate};
use anyhow::Result;
use event_bus::EventBus;
use lens_config::{DataDirectory, LensSettings, get_or_create_settings, read_settings};
use radon::RadonClient;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Process-scoped state shared by every command.
#[derive(Clone)]
pub struct LensContext {
    pub data_directory: DataDirectory,
    pub coordinator: Arc<RefreshCoordinator>,
}

impl LensContext {
    pub fn new(data_directory: DataDirectory, radon_override: Option<PathBuf>) -> Result<Self> {
        let settings = get_or_create_settings(&data_directory);
        let executable = radon_override.unwrap_or_else(|| PathBuf::from(&settings.radon_path));
        info!("Using radon executable {}", executable.display());

        let client = RadonClient::new(executable).with_timeout(settings.timeout());
        Self::with_client(data_directory, &settings, Arc::new(client))
    }

    pub fn with_client(
        data_directory: DataDirectory,
        settings: &LensSettings,
        client: Arc<dyn AnalysisClient>,
    ) -> Result<Self> {
        let gate = Arc::new(VersionGate::new(client.clone(), settings.minimum_version()?));
        let coordinator = RefreshCoordinator::new(
            client,
            gate,
            Arc::new(AnalysisCache::new()),
            Arc::new(EventBus::new()),
        )
        .with_policy(settings.commit_policy);

        Ok(Self {
            data_directory,
            coordinator: Arc::new(coordinator),
        })
    }

    /// Re-reads the flag on every call so toggling it takes effect on the
    /// next render without a restart.
    pub fn annotations_enabled(&self) -> bool {
        read_settings(&self.data_directory.settings_path).annotations_enabled
    }
}
