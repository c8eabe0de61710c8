//! End-to-end training run: dataset -> pipeline -> holdout metrics -> store

use crate::dataset::DatasetAccessor;
use crate::error::{MlopsError, Result};
use crate::preprocessing::PreprocessingBuilder;
use crate::registry::{Hyperparams, ModelRegistry};
use crate::store::{validate_id, ModelStore, TrainingMetadata};
use crate::tracking::ExperimentTracker;
use super::labels::{distinct_classes, encode_labels, labels_from_column, ClassLabel};
use super::metrics::classification_metrics;
use super::pipeline::Pipeline;
use super::split::train_test_split;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Project name runs are reported under unless configured otherwise.
pub const DEFAULT_PROJECT: &str = "MLOps-HW01";

fn default_target() -> String {
    "target".to_string()
}

fn default_test_size() -> f64 {
    0.2
}

fn default_shuffle() -> bool {
    true
}

fn default_random_state() -> u64 {
    42
}

/// Parameters of one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainRequest {
    pub model_key: String,
    pub dataset_id: String,
    #[serde(default = "default_target")]
    pub target_column: String,
    #[serde(default)]
    pub hyperparams: Option<Hyperparams>,
    #[serde(default = "default_test_size")]
    pub test_size: f64,
    #[serde(default = "default_shuffle")]
    pub shuffle: bool,
    #[serde(default = "default_random_state")]
    pub random_state: u64,
    /// Existing id to retrain in place
    #[serde(default)]
    pub model_id: Option<String>,
}

impl TrainRequest {
    pub fn new(dataset_id: impl Into<String>, model_key: impl Into<String>) -> Self {
        Self {
            model_key: model_key.into(),
            dataset_id: dataset_id.into(),
            target_column: default_target(),
            hyperparams: None,
            test_size: default_test_size(),
            shuffle: default_shuffle(),
            random_state: default_random_state(),
            model_id: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_column = target.into();
        self
    }

    pub fn with_hyperparams(mut self, params: Hyperparams) -> Self {
        self.hyperparams = Some(params);
        self
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }
}

/// Result of a committed training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainOutcome {
    pub model_id: String,
    pub model_key: String,
    pub metrics: BTreeMap<String, f64>,
}

fn rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let idx = IdxCa::from_vec(
        "idx".into(),
        indices.iter().map(|&i| i as IdxSize).collect(),
    );
    Ok(df.take(&idx)?)
}

/// Composes dataset access, the registry, preprocessing and the store.
pub struct TrainingOrchestrator {
    datasets: Arc<dyn DatasetAccessor>,
    registry: Arc<ModelRegistry>,
    store: Arc<ModelStore>,
    tracker: Arc<dyn ExperimentTracker>,
    project: String,
}

impl TrainingOrchestrator {
    pub fn new(
        datasets: Arc<dyn DatasetAccessor>,
        registry: Arc<ModelRegistry>,
        store: Arc<ModelStore>,
        tracker: Arc<dyn ExperimentTracker>,
    ) -> Self {
        Self {
            datasets,
            registry,
            store,
            tracker,
            project: DEFAULT_PROJECT.to_string(),
        }
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    /// Train, evaluate on the holdout split and commit the model.
    ///
    /// Nothing is written until the fit and evaluation have succeeded.
    pub fn train(&self, req: &TrainRequest) -> Result<TrainOutcome> {
        let start = Instant::now();

        if let Some(id) = &req.model_id {
            validate_id(id)?;
        }
        let spec = self.registry.get(&req.model_key)?;
        let requested = req.hyperparams.clone().unwrap_or_default();

        let df = self.datasets.load(&req.dataset_id)?;
        let target = df
            .column(&req.target_column)
            .map_err(|_| MlopsError::TargetColumnNotFound(req.target_column.clone()))?;

        let labels = labels_from_column(target)?;
        let classes = distinct_classes(&labels);
        if classes.len() < 2 {
            return Err(MlopsError::ValidationError(format!(
                "target column {} needs at least 2 classes, found {}",
                req.target_column,
                classes.len()
            )));
        }

        let x = df.drop(&req.target_column)?;
        if x.width() == 0 {
            return Err(MlopsError::ValidationError(
                "dataset has no feature columns besides the target".to_string(),
            ));
        }

        let effective = spec.merge(&requested, self.registry.policy())?;
        let estimator = spec.kind.build(&effective)?;
        let (preprocessor, feature_order) = PreprocessingBuilder::build(&x);
        let mut pipeline = Pipeline::new(preprocessor, estimator, classes.clone());

        let split = train_test_split(x.height(), req.test_size, req.shuffle, req.random_state)?;
        let x_train = rows(&x, &split.train)?;
        let x_test = rows(&x, &split.test)?;
        let y_train: Vec<ClassLabel> = split.train.iter().map(|&i| labels[i].clone()).collect();
        let y_test: Vec<ClassLabel> = split.test.iter().map(|&i| labels[i].clone()).collect();

        pipeline.fit(&x_train, &y_train)?;

        let y_pred = pipeline.predict_indices(&x_test)?;
        let y_true = encode_labels(&y_test, &classes)?;
        let metrics = classification_metrics(&y_true, &y_pred);

        let meta = TrainingMetadata {
            model_key: req.model_key.clone(),
            dataset_id: req.dataset_id.clone(),
            target_column: req.target_column.clone(),
            feature_order,
            hyperparams: effective.clone(),
            metrics: metrics.clone(),
            test_size: req.test_size,
            shuffle: req.shuffle,
            random_state: req.random_state,
        };
        let model_id = self.store.save(&pipeline, meta, req.model_id.as_deref())?;

        info!(
            model_id = %model_id,
            model_key = %req.model_key,
            dataset_id = %req.dataset_id,
            train_rows = split.train.len(),
            test_rows = split.test.len(),
            accuracy = metrics.get("accuracy").copied().unwrap_or_default(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Model trained"
        );

        self.report(req, &effective, &metrics, &model_id);

        Ok(TrainOutcome {
            model_id,
            model_key: req.model_key.clone(),
            metrics,
        })
    }

    /// Best-effort experiment tracking; failures are logged and dropped.
    fn report(&self, req: &TrainRequest, effective: &Hyperparams, metrics: &BTreeMap<String, f64>, model_id: &str) {
        let params = serde_json::json!({
            "model_key": req.model_key,
            "dataset_id": req.dataset_id,
            "target_column": req.target_column,
            "hyperparams": effective,
            "test_size": req.test_size,
            "shuffle": req.shuffle,
            "random_state": req.random_state,
        });
        let run_name = format!("train/{}", req.model_key);

        let run = match self.tracker.start_run(&self.project, &run_name, &params) {
            Ok(Some(run)) => run,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, project = %self.project, "Failed to start tracking run");
                return;
            }
        };

        if let Err(e) = self.tracker.log_metrics(&run, metrics) {
            warn!(error = %e, run_id = %run.run_id, "Failed to log metrics");
        }

        let artifact_name = format!("{}-{}", req.model_key, &model_id[..model_id.len().min(8)]);
        let artifact_path = self.store.artifact_path(model_id);
        if let Err(e) = self
            .tracker
            .register_artifact(&run, Path::new(&artifact_path), &artifact_name)
        {
            warn!(error = %e, run_id = %run.run_id, "Failed to register model artifact");
        }

        if let Err(e) = self.tracker.close_run(&run) {
            warn!(error = %e, run_id = %run.run_id, "Failed to close tracking run");
        }
    }
}
