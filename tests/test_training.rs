//! Integration test: training, storage and deletion end-to-end

mod common;

use serde_json::json;
use std::sync::Arc;
use tabular_mlops::inference::{InferenceEngine, Instance};
use tabular_mlops::registry::{HyperparamPolicy, ModelRegistry};
use tabular_mlops::store::ModelStore;
use tabular_mlops::tracking::{ExperimentTracker, LocalTracker, NoopTracker, RunStatus};
use tabular_mlops::training::{TrainRequest, TrainingOrchestrator};
use tabular_mlops::MlopsError;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    dataset_id: String,
    store: Arc<ModelStore>,
    registry: Arc<ModelRegistry>,
    trainer: TrainingOrchestrator,
}

fn fixture_with(registry: ModelRegistry, tracker: Arc<dyn ExperimentTracker>) -> Fixture {
    let dir = TempDir::new().unwrap();
    let datasets = common::dataset_store(&dir);
    let uploaded = datasets
        .upload(common::people_csv(100).as_bytes(), Some("people.csv"), Some("text/csv"))
        .unwrap();

    let store = Arc::new(ModelStore::open(dir.path().join("models")).unwrap());
    let registry = Arc::new(registry);
    let trainer = TrainingOrchestrator::new(datasets, Arc::clone(&registry), Arc::clone(&store), tracker);
    Fixture {
        _dir: dir,
        dataset_id: uploaded.dataset_id,
        store,
        registry,
        trainer,
    }
}

fn fixture() -> Fixture {
    fixture_with(ModelRegistry::new(), Arc::new(NoopTracker))
}

fn instance(value: serde_json::Value) -> Instance {
    serde_json::from_value(value).unwrap()
}

#[test]
fn test_end_to_end_logistic_regression() {
    let f = fixture();
    assert!(f.store.list().unwrap().is_empty());

    let request = TrainRequest::new(&f.dataset_id, "logistic_regression")
        .with_test_size(0.2)
        .with_shuffle(true)
        .with_random_state(42);
    let outcome = f.trainer.train(&request).unwrap();

    let accuracy = outcome.metrics["accuracy"];
    assert!((0.0..=1.0).contains(&accuracy));
    assert_eq!(outcome.model_key, "logistic_regression");

    let records = f.store.list().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].model_id, outcome.model_id);
    assert_eq!(records[0].dataset_id, f.dataset_id);
    assert_eq!(records[0].feature_order, vec!["age", "city"]);

    let engine = InferenceEngine::new(Arc::clone(&f.store), Arc::clone(&f.registry));
    let out = engine
        .predict(&outcome.model_id, &[instance(json!({"age": 30, "city": "paris"}))])
        .unwrap();
    assert_eq!(out.predictions.len(), 1);
    assert!(out.predictions[0] == json!(0) || out.predictions[0] == json!(1));
}

#[test]
fn test_random_forest_learns_signal() {
    let f = fixture();
    let request = TrainRequest::new(&f.dataset_id, "random_forest")
        .with_hyperparams(serde_json::from_value(json!({"n_estimators": 25, "n_jobs": 2})).unwrap());
    let outcome = f.trainer.train(&request).unwrap();

    // labels follow age > 45 except for every 11th row
    assert!(outcome.metrics["accuracy"] >= 0.6, "metrics: {:?}", outcome.metrics);
    let record = f.store.get(&outcome.model_id).unwrap();
    assert_eq!(record.hyperparams["n_estimators"], json!(25));
    assert_eq!(record.hyperparams["max_features"], json!("sqrt"));
}

#[test]
fn test_retrain_overwrites_in_place() {
    let f = fixture();
    let first = f
        .trainer
        .train(&TrainRequest::new(&f.dataset_id, "logistic_regression").with_model_id("churn"))
        .unwrap();
    let created = f.store.get("churn").unwrap().created_at;

    let second = f
        .trainer
        .train(
            &TrainRequest::new(&f.dataset_id, "random_forest")
                .with_model_id("churn")
                .with_random_state(7),
        )
        .unwrap();

    assert_eq!(first.model_id, "churn");
    assert_eq!(second.model_id, "churn");
    let records = f.store.list().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].model_key, "random_forest");
    assert_eq!(records[0].random_state, 7);
    assert!(records[0].created_at >= created);

    let (pipeline, _) = f.store.load("churn").unwrap();
    assert_eq!(pipeline.estimator().name(), "RandomForest");
}

#[test]
fn test_delete_semantics() {
    let f = fixture();
    let outcome = f
        .trainer
        .train(&TrainRequest::new(&f.dataset_id, "logistic_regression"))
        .unwrap();

    assert!(f.store.delete(&outcome.model_id).unwrap());
    assert!(matches!(
        f.store.load(&outcome.model_id),
        Err(MlopsError::ModelNotFound(_))
    ));
    assert!(!f.store.delete(&outcome.model_id).unwrap());
    assert!(f.store.list().unwrap().is_empty());
}

#[test]
fn test_new_ids_are_unique() {
    let f = fixture();
    let a = f
        .trainer
        .train(&TrainRequest::new(&f.dataset_id, "logistic_regression"))
        .unwrap();
    let b = f
        .trainer
        .train(&TrainRequest::new(&f.dataset_id, "logistic_regression"))
        .unwrap();
    assert_ne!(a.model_id, b.model_id);
    assert_eq!(f.store.list().unwrap().len(), 2);
}

#[test]
fn test_strict_policy_rejects_unknown_hyperparams() {
    let f = fixture_with(
        ModelRegistry::new().with_policy(HyperparamPolicy::Strict),
        Arc::new(NoopTracker),
    );
    let request = TrainRequest::new(&f.dataset_id, "logistic_regression")
        .with_hyperparams(serde_json::from_value(json!({"C": 2.0, "bogus_param": 1})).unwrap());

    let err = f.trainer.train(&request).unwrap_err();
    assert!(matches!(err, MlopsError::ValidationError(ref m) if m.contains("bogus_param")));
    assert!(f.store.list().unwrap().is_empty());
}

#[test]
fn test_invalid_caller_id_rejected() {
    let f = fixture();
    let err = f
        .trainer
        .train(&TrainRequest::new(&f.dataset_id, "logistic_regression").with_model_id("../escape"))
        .unwrap_err();
    assert!(matches!(err, MlopsError::ValidationError(_)));
}

#[test]
fn test_runs_are_tracked() {
    let runs_dir = TempDir::new().unwrap();
    let tracker = Arc::new(LocalTracker::new(runs_dir.path()).unwrap());
    let f = fixture_with(ModelRegistry::new(), tracker.clone());

    let outcome = f
        .trainer
        .train(&TrainRequest::new(&f.dataset_id, "logistic_regression"))
        .unwrap();

    let runs = tracker.list_runs("MLOps-HW01").unwrap();
    assert_eq!(runs.len(), 1);
    let run = &runs[0];
    assert_eq!(run.name, "train/logistic_regression");
    assert_eq!(run.status, RunStatus::Finished);
    assert_eq!(run.metrics, outcome.metrics);
    assert_eq!(
        run.artifacts[0].name,
        format!("logistic_regression-{}", &outcome.model_id[..8])
    );
    assert_eq!(run.params["dataset_id"], json!(f.dataset_id));
}
