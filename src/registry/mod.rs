//! Catalog of trainable model families
//!
//! Every family is a [`ModelKind`] variant carrying its default
//! hyperparameters, whether it can emit class probabilities, and how to turn
//! a sanitized hyperparameter map into an unfitted [`Estimator`].

mod params;

use crate::error::{MlopsError, Result};
use crate::training::{Estimator, LogisticRegression, RandomForest};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::debug;

/// Hyperparameters keyed by name, as received over the wire.
pub type Hyperparams = BTreeMap<String, Value>;

/// Closed set of model families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    LogisticRegression,
    RandomForest,
}

impl ModelKind {
    pub const ALL: [ModelKind; 2] = [ModelKind::LogisticRegression, ModelKind::RandomForest];

    pub fn key(&self) -> &'static str {
        match self {
            ModelKind::LogisticRegression => "logistic_regression",
            ModelKind::RandomForest => "random_forest",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }

    /// Default hyperparameters; only these keys may be overridden.
    pub fn defaults(&self) -> Hyperparams {
        let pairs = match self {
            ModelKind::LogisticRegression => vec![
                ("C", json!(1.0)),
                ("max_iter", json!(200)),
                ("tol", json!(1e-4)),
                ("learning_rate", json!(0.5)),
                ("fit_intercept", json!(true)),
            ],
            ModelKind::RandomForest => vec![
                ("n_estimators", json!(200)),
                ("max_depth", Value::Null),
                ("min_samples_split", json!(2)),
                ("min_samples_leaf", json!(1)),
                ("max_features", json!("sqrt")),
                ("random_state", json!(42)),
                ("n_jobs", json!(-1)),
            ],
        };
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    pub fn supports_probabilities(&self) -> bool {
        match self {
            ModelKind::LogisticRegression | ModelKind::RandomForest => true,
        }
    }

    /// Construct an unfitted estimator from a complete hyperparameter map.
    pub fn build(&self, params: &Hyperparams) -> Result<Estimator> {
        match self {
            ModelKind::LogisticRegression => {
                let model = LogisticRegression::new()
                    .with_c(params::positive_f64(params, "C")?)
                    .with_max_iter(params::usize_at_least(params, "max_iter", 1)?)
                    .with_tol(params::positive_f64(params, "tol")?)
                    .with_learning_rate(params::positive_f64(params, "learning_rate")?)
                    .with_fit_intercept(params::boolean(params, "fit_intercept")?);
                Ok(Estimator::LogisticRegression(model))
            }
            ModelKind::RandomForest => {
                let model = RandomForest::new(params::usize_at_least(params, "n_estimators", 1)?)
                    .with_max_depth(params::optional_positive_usize(params, "max_depth")?)
                    .with_min_samples_split(params::usize_at_least(params, "min_samples_split", 2)?)
                    .with_min_samples_leaf(params::usize_at_least(params, "min_samples_leaf", 1)?)
                    .with_max_features(params::max_features(params, "max_features")?)
                    .with_random_state(params::optional_seed(params, "random_state")?)
                    .with_n_jobs(params::n_jobs(params, "n_jobs")?);
                Ok(Estimator::RandomForest(model))
            }
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// How to treat hyperparameter keys that a family does not declare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HyperparamPolicy {
    /// Drop unknown keys silently.
    #[default]
    Lenient,
    /// Reject the request with a validation error.
    Strict,
}

impl FromStr for HyperparamPolicy {
    type Err = MlopsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "lenient" => Ok(HyperparamPolicy::Lenient),
            "strict" => Ok(HyperparamPolicy::Strict),
            other => Err(MlopsError::ValidationError(format!(
                "unknown hyperparameter policy: {}",
                other
            ))),
        }
    }
}

/// A registered model family.
#[derive(Debug, Clone, Serialize)]
pub struct ModelSpec {
    pub key: String,
    pub kind: ModelKind,
    pub defaults: Hyperparams,
    pub supports_probabilities: bool,
}

impl ModelSpec {
    pub fn new(kind: ModelKind) -> Self {
        Self {
            key: kind.key().to_string(),
            kind,
            defaults: kind.defaults(),
            supports_probabilities: kind.supports_probabilities(),
        }
    }

    /// Defaults overlaid with the caller's values for declared keys only.
    pub fn merge(&self, params: &Hyperparams, policy: HyperparamPolicy) -> Result<Hyperparams> {
        let unknown: Vec<&str> = params
            .keys()
            .filter(|k| !self.defaults.contains_key(k.as_str()))
            .map(|k| k.as_str())
            .collect();

        if !unknown.is_empty() {
            match policy {
                HyperparamPolicy::Strict => {
                    return Err(MlopsError::ValidationError(format!(
                        "unknown hyperparameters for {}: {}",
                        self.key,
                        unknown.join(", ")
                    )));
                }
                HyperparamPolicy::Lenient => {
                    debug!(model_key = %self.key, dropped = ?unknown, "Dropping unknown hyperparameters");
                }
            }
        }

        let mut merged = self.defaults.clone();
        for (key, value) in params {
            if let Some(slot) = merged.get_mut(key) {
                *slot = value.clone();
            }
        }
        Ok(merged)
    }
}

/// Immutable catalog built once at startup.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    specs: BTreeMap<String, ModelSpec>,
    policy: HyperparamPolicy,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelRegistry {
    /// Registry holding every built-in family.
    pub fn new() -> Self {
        let specs = ModelKind::ALL
            .into_iter()
            .map(|kind| (kind.key().to_string(), ModelSpec::new(kind)))
            .collect();
        Self {
            specs,
            policy: HyperparamPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: HyperparamPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> HyperparamPolicy {
        self.policy
    }

    /// Registered keys in ascending order.
    pub fn list_keys(&self) -> Vec<String> {
        self.specs.keys().cloned().collect()
    }

    pub fn get(&self, key: &str) -> Result<&ModelSpec> {
        self.specs
            .get(key)
            .ok_or_else(|| MlopsError::UnknownModelKey(key.to_string()))
    }

    /// Copy of the defaults; the registry's own table is never handed out.
    pub fn defaults(&self, key: &str) -> Result<Hyperparams> {
        Ok(self.get(key)?.defaults.clone())
    }

    /// Effective hyperparameters for `key` after sanitization.
    pub fn resolve(&self, key: &str, params: &Hyperparams) -> Result<Hyperparams> {
        self.get(key)?.merge(params, self.policy)
    }

    /// Unfitted estimator for `key` with `params` merged over the defaults.
    pub fn build(&self, key: &str, params: &Hyperparams) -> Result<Estimator> {
        let spec = self.get(key)?;
        let merged = spec.merge(params, self.policy)?;
        spec.kind.build(&merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hp(value: Value) -> Hyperparams {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_list_keys_sorted() {
        let registry = ModelRegistry::new();
        assert_eq!(registry.list_keys(), vec!["logistic_regression", "random_forest"]);
    }

    #[test]
    fn test_unknown_key() {
        let registry = ModelRegistry::new();
        let err = registry.get("svm").unwrap_err();
        assert!(matches!(err, MlopsError::UnknownModelKey(ref k) if k == "svm"));
        assert!(registry.build("svm", &Hyperparams::new()).is_err());
    }

    #[test]
    fn test_unknown_params_dropped() {
        let registry = ModelRegistry::new();
        let params = hp(json!({"C": 2.0, "bogus_param": 1}));

        let effective = registry.resolve("logistic_regression", &params).unwrap();
        assert_eq!(effective["C"], json!(2.0));
        assert!(!effective.contains_key("bogus_param"));

        match registry.build("logistic_regression", &params).unwrap() {
            Estimator::LogisticRegression(model) => assert_eq!(model.c, 2.0),
            other => panic!("unexpected estimator {}", other.name()),
        }
    }

    #[test]
    fn test_strict_policy_rejects_unknown() {
        let registry = ModelRegistry::new().with_policy(HyperparamPolicy::Strict);
        let params = hp(json!({"C": 2.0, "bogus_param": 1}));
        assert!(matches!(
            registry.build("logistic_regression", &params),
            Err(MlopsError::ValidationError(_))
        ));
        assert!(registry.build("logistic_regression", &hp(json!({"C": 2.0}))).is_ok());
    }

    #[test]
    fn test_defaults_not_mutated() {
        let registry = ModelRegistry::new();
        let mut copy = registry.defaults("random_forest").unwrap();
        copy.insert("n_estimators".to_string(), json!(1));

        registry
            .build("random_forest", &hp(json!({"n_estimators": 5})))
            .unwrap();
        assert_eq!(registry.defaults("random_forest").unwrap()["n_estimators"], json!(200));
    }

    #[test]
    fn test_malformed_value() {
        let registry = ModelRegistry::new();
        let err = registry
            .build("random_forest", &hp(json!({"n_estimators": "many"})))
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_random_forest_params_applied() {
        let registry = ModelRegistry::new();
        let params = hp(json!({"n_estimators": 10, "max_depth": 4, "n_jobs": 2}));
        match registry.build("random_forest", &params).unwrap() {
            Estimator::RandomForest(rf) => {
                assert_eq!(rf.n_estimators, 10);
                assert_eq!(rf.max_depth, Some(4));
                assert_eq!(rf.n_jobs, Some(2));
                assert_eq!(rf.random_state, Some(42));
            }
            other => panic!("unexpected estimator {}", other.name()),
        }
    }

    #[test]
    fn test_capability_flags() {
        let registry = ModelRegistry::new();
        for key in registry.list_keys() {
            assert!(registry.get(&key).unwrap().supports_probabilities);
        }
        assert_eq!(ModelKind::from_key("random_forest"), Some(ModelKind::RandomForest));
        assert_eq!("STRICT".parse::<HyperparamPolicy>().unwrap(), HyperparamPolicy::Strict);
        assert!("loose".parse::<HyperparamPolicy>().is_err());
    }
}
