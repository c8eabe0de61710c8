//! Application state management

use crate::config::Settings;
use crate::dataset::{DatasetStore, DvcVersioning, NoopVersioning, RemoteVersioning, S3Credentials};
use crate::error::Result;
use crate::inference::InferenceEngine;
use crate::registry::ModelRegistry;
use crate::store::ModelStore;
use crate::tracking::{ExperimentTracker, LocalTracker, NoopTracker};
use crate::training::TrainingOrchestrator;
use std::sync::Arc;
use tracing::info;

/// Service components shared across handlers
pub struct AppState {
    pub settings: Settings,
    pub registry: Arc<ModelRegistry>,
    pub store: Arc<ModelStore>,
    pub datasets: Arc<DatasetStore>,
    pub versioning: Arc<dyn RemoteVersioning>,
    pub trainer: TrainingOrchestrator,
    pub inference: InferenceEngine,
}

impl AppState {
    /// Open the stores and wire the collaborators chosen by `settings`.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let versioning: Arc<dyn RemoteVersioning> = if settings.dvc_enabled {
            Arc::new(DvcVersioning::new(
                ".",
                settings.dvc_remote.clone(),
                S3Credentials {
                    endpoint_url: settings.s3_endpoint_url.clone(),
                    access_key_id: settings.s3_access_key_id.clone(),
                    secret_access_key: settings.s3_secret_access_key.clone(),
                },
            ))
        } else {
            Arc::new(NoopVersioning)
        };

        let tracker: Arc<dyn ExperimentTracker> = match &settings.tracking_dir {
            Some(dir) => Arc::new(LocalTracker::new(dir)?),
            None => Arc::new(NoopTracker),
        };

        let registry = Arc::new(ModelRegistry::new().with_policy(settings.hyperparam_policy));
        let store = Arc::new(ModelStore::open(&settings.models_dir)?);
        let datasets = Arc::new(DatasetStore::open(&settings.data_dir, Arc::clone(&versioning))?);

        let trainer = TrainingOrchestrator::new(
            datasets.clone(),
            Arc::clone(&registry),
            Arc::clone(&store),
            tracker,
        )
        .with_project(settings.tracking_project.clone());
        let inference = InferenceEngine::new(Arc::clone(&store), Arc::clone(&registry))
            .with_unknown_feature_policy(settings.unknown_feature_policy);

        info!(
            data_dir = %settings.data_dir.display(),
            models_dir = %settings.models_dir.display(),
            tracking = settings.tracking_dir.is_some(),
            dvc = settings.dvc_enabled,
            "Service state initialized"
        );

        Ok(Self {
            settings,
            registry,
            store,
            datasets,
            versioning,
            trainer,
            inference,
        })
    }
}
