//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use tabular_mlops::config::Settings;
use tabular_mlops::dataset::{DatasetStore, NoopVersioning};
use tempfile::TempDir;

/// `age:int, city:string, target:{0,1}` with `n` rows; older people are
/// mostly positive.
pub fn people_csv(n: usize) -> String {
    let cities = ["paris", "oslo", "rome"];
    let mut csv = String::from("age,city,target\n");
    for i in 0..n {
        let age = 18 + (i * 37) % 60;
        let city = cities[i % cities.len()];
        let target = if (age > 45) ^ (i % 11 == 0) { 1 } else { 0 };
        csv.push_str(&format!("{},{},{}\n", age, city, target));
    }
    csv
}

pub fn dataset_store(dir: &TempDir) -> Arc<DatasetStore> {
    Arc::new(DatasetStore::open(dir.path().join("datasets"), Arc::new(NoopVersioning)).unwrap())
}

/// Settings rooted in `dir` with tracking enabled.
pub fn settings(dir: &TempDir) -> Settings {
    Settings {
        data_dir: dir.path().join("datasets"),
        models_dir: dir.path().join("models"),
        tracking_dir: Some(dir.path().join("runs")),
        max_upload_size: 10 * 1024 * 1024,
        ..Settings::default()
    }
}
