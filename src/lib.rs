//! tabular_mlops - training, versioned storage and serving of tabular
//! classification models
//!
//! # Modules
//!
//! ## Core
//! - [`registry`] - Model families, default hyperparameters, estimator construction
//! - [`preprocessing`] - Column-aware imputation and one-hot encoding
//! - [`training`] - Estimators, fitted pipelines and the training run
//! - [`store`] - Versioned model artifacts with a JSON index
//! - [`inference`] - Predictions from JSON instances
//!
//! ## Collaborators
//! - [`dataset`] - Dataset upload, listing and loading; remote versioning
//! - [`tracking`] - Experiment tracking
//!
//! ## Services
//! - [`server`] - HTTP server with REST API
//! - [`cli`] - Command-line interface
//! - [`config`] - Settings from the environment

// Core error handling
pub mod error;

// Core ML modules
pub mod registry;
pub mod preprocessing;
pub mod training;
pub mod store;
pub mod inference;

// Collaborators
pub mod dataset;
pub mod tracking;

// Services
pub mod config;
pub mod server;
pub mod cli;

pub use error::{MlopsError, Result};
pub use registry::{HyperparamPolicy, Hyperparams, ModelKind, ModelRegistry, ModelSpec};
pub use preprocessing::{ColumnPreprocessor, PreprocessingBuilder};
pub use training::{ClassLabel, Pipeline, TrainOutcome, TrainRequest, TrainingOrchestrator};
pub use store::{ModelStore, TrainedModelRecord, TrainingMetadata};
pub use inference::{InferenceEngine, Instance, Prediction, UnknownFeaturePolicy};
pub use dataset::{DatasetAccessor, DatasetStore, RemoteVersioning};
pub use tracking::{ExperimentTracker, LocalTracker, NoopTracker};
pub use config::Settings;
