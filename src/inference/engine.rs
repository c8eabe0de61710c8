//! Inference engine implementation
//!
//! Every call reloads the pipeline from the store, aligns the JSON instances
//! to the fitted feature order and runs the full pipeline.

use crate::error::{MlopsError, Result};
use crate::preprocessing::{ColumnKind, ColumnPreprocessor};
use crate::registry::ModelRegistry;
use crate::store::ModelStore;
use crate::training::Pipeline;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// One instance: feature name to raw JSON value.
pub type Instance = Map<String, Value>;

/// What to do with instance fields the model was not fitted on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownFeaturePolicy {
    /// Drop them.
    #[default]
    Ignore,
    /// Fail the request with a validation error.
    Reject,
}

impl FromStr for UnknownFeaturePolicy {
    type Err = MlopsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ignore" => Ok(UnknownFeaturePolicy::Ignore),
            "reject" => Ok(UnknownFeaturePolicy::Reject),
            other => Err(MlopsError::ValidationError(format!(
                "unknown feature policy: {}",
                other
            ))),
        }
    }
}

/// Predicted labels in instance order, plus per-class probabilities in the
/// model's class order when the family supports them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub predictions: Vec<Value>,
    pub probabilities: Option<Vec<Vec<f64>>>,
}

/// Serves predictions for stored models
pub struct InferenceEngine {
    store: Arc<ModelStore>,
    registry: Arc<ModelRegistry>,
    unknown_features: UnknownFeaturePolicy,
}

impl std::fmt::Debug for InferenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceEngine")
            .field("store", &self.store.root())
            .field("unknown_features", &self.unknown_features)
            .finish()
    }
}

impl InferenceEngine {
    pub fn new(store: Arc<ModelStore>, registry: Arc<ModelRegistry>) -> Self {
        Self {
            store,
            registry,
            unknown_features: UnknownFeaturePolicy::default(),
        }
    }

    pub fn with_unknown_feature_policy(mut self, policy: UnknownFeaturePolicy) -> Self {
        self.unknown_features = policy;
        self
    }

    pub fn unknown_feature_policy(&self) -> UnknownFeaturePolicy {
        self.unknown_features
    }

    /// Predict one label per instance, in order.
    pub fn predict(&self, model_id: &str, instances: &[Instance]) -> Result<Prediction> {
        if instances.is_empty() {
            return Err(MlopsError::NoInstances);
        }
        let start = Instant::now();

        let (pipeline, record) = self.store.load(model_id)?;
        if self.unknown_features == UnknownFeaturePolicy::Reject {
            reject_unknown(pipeline.feature_order(), instances)?;
        }

        let frame = align_instances(pipeline.preprocessor(), instances)?;
        let predictions: Vec<Value> = pipeline
            .predict(&frame)?
            .iter()
            .map(|label| label.to_json())
            .collect();

        let supports_probabilities = self
            .registry
            .get(&record.model_key)
            .map(|spec| spec.supports_probabilities)
            .unwrap_or(false);
        let probabilities = if supports_probabilities {
            probabilities(&pipeline, &frame, model_id)
        } else {
            None
        };

        debug!(
            model_id = %model_id,
            instances = instances.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Prediction served"
        );

        Ok(Prediction {
            predictions,
            probabilities,
        })
    }
}

/// Probability rows, or `None` when the pipeline cannot produce them.
fn probabilities(pipeline: &Pipeline, frame: &DataFrame, model_id: &str) -> Option<Vec<Vec<f64>>> {
    match pipeline.predict_proba(frame) {
        Ok(proba) => Some(proba.rows().into_iter().map(|row| row.to_vec()).collect()),
        Err(e) => {
            warn!(model_id = %model_id, error = %e, "Probability computation failed");
            None
        }
    }
}

fn reject_unknown(feature_order: &[String], instances: &[Instance]) -> Result<()> {
    let mut unknown: Vec<&str> = instances
        .iter()
        .flat_map(|inst| inst.keys())
        .filter(|k| !feature_order.iter().any(|f| f == *k))
        .map(|k| k.as_str())
        .collect();
    if unknown.is_empty() {
        return Ok(());
    }
    unknown.sort_unstable();
    unknown.dedup();
    Err(MlopsError::ValidationError(format!(
        "unknown features: {}",
        unknown.join(", ")
    )))
}

fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// One row per instance with exactly the fitted columns; absent or
/// unconvertible values become nulls for the imputers to fill.
pub(crate) fn align_instances(preprocessor: &ColumnPreprocessor, instances: &[Instance]) -> Result<DataFrame> {
    let mut columns = Vec::with_capacity(preprocessor.feature_order().len());
    for name in preprocessor.feature_order() {
        let kind = preprocessor
            .column_kind(name)
            .ok_or_else(|| MlopsError::FeatureNotFound(name.clone()))?;
        let column = match kind {
            ColumnKind::Numeric => {
                let values: Vec<Option<f64>> = instances
                    .iter()
                    .map(|inst| inst.get(name).and_then(numeric_value))
                    .collect();
                Column::new(name.as_str().into(), values)
            }
            ColumnKind::Categorical => {
                let values: Vec<Option<String>> = instances
                    .iter()
                    .map(|inst| inst.get(name).and_then(text_value))
                    .collect();
                Column::new(name.as_str().into(), values)
            }
        };
        columns.push(column);
    }
    Ok(DataFrame::new(columns)?)
}
