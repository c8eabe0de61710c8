//! HTTP request handlers

use std::collections::BTreeMap;
use std::sync::Arc;
use axum::{
    extract::{rejection::JsonRejection, Multipart, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::dataset::{DatasetInfo, UploadedDataset};
use crate::inference::{Instance, Prediction};
use crate::store::TrainedModelRecord;
use crate::training::{TrainOutcome, TrainRequest};

use super::error::{Result, ServerError};
use super::state::AppState;

/// Run a synchronous core call off the async executor.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> crate::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServerError::Internal(format!("worker task failed: {}", e)))?
        .map_err(ServerError::from)
}

// ============================================================================
// System
// ============================================================================

pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn list_model_classes(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({ "classes": state.registry.list_keys() }))
}

// ============================================================================
// Datasets
// ============================================================================

pub async fn list_datasets(State(state): State<Arc<AppState>>) -> Result<Json<Vec<DatasetInfo>>> {
    let datasets = Arc::clone(&state.datasets);
    let items = blocking(move || datasets.list()).await?;
    Ok(Json(items))
}

/// Store the multipart field `file` as a new dataset
pub async fn upload_dataset(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadedDataset>> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(|s| s.to_string());
        let content_type = field.content_type().map(|s| s.to_string());
        let data = field.bytes().await?;

        info!(
            file_name = file_name.as_deref().unwrap_or(""),
            bytes = data.len(),
            "Received dataset upload"
        );

        let datasets = Arc::clone(&state.datasets);
        let uploaded = blocking(move || {
            datasets.upload(&data, file_name.as_deref(), content_type.as_deref())
        })
        .await?;
        return Ok(Json(uploaded));
    }

    Err(ServerError::BadRequest("No file provided".to_string()))
}

pub async fn delete_dataset(
    State(state): State<Arc<AppState>>,
    Path(dataset_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let datasets = Arc::clone(&state.datasets);
    let id = dataset_id.clone();
    if !blocking(move || datasets.delete(&id)).await? {
        return Err(ServerError::NotFound("Dataset not found".to_string()));
    }
    Ok(Json(json!({ "status": "deleted", "dataset_id": dataset_id })))
}

// ============================================================================
// Training
// ============================================================================

pub async fn train(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<TrainRequest>, JsonRejection>,
) -> Result<Json<TrainOutcome>> {
    let Json(request) = payload?;
    let outcome = blocking(move || state.trainer.train(&request)).await?;
    Ok(Json(outcome))
}

// ============================================================================
// Models
// ============================================================================

/// Listing entry for a stored model
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_id: String,
    pub model_key: String,
    pub dataset_id: String,
    pub target_column: String,
    pub created_at: String,
    pub metrics: Option<BTreeMap<String, f64>>,
}

impl From<TrainedModelRecord> for ModelInfo {
    fn from(record: TrainedModelRecord) -> Self {
        Self {
            model_id: record.model_id,
            model_key: record.model_key,
            dataset_id: record.dataset_id,
            target_column: record.target_column,
            created_at: record.created_at,
            metrics: Some(record.metrics),
        }
    }
}

pub async fn list_models(State(state): State<Arc<AppState>>) -> Result<Json<Vec<ModelInfo>>> {
    let store = Arc::clone(&state.store);
    let records = blocking(move || store.list()).await?;
    Ok(Json(records.into_iter().map(ModelInfo::from).collect()))
}

pub async fn get_model(
    State(state): State<Arc<AppState>>,
    Path(model_id): Path<String>,
) -> Result<Json<TrainedModelRecord>> {
    let store = Arc::clone(&state.store);
    let record = blocking(move || store.get(&model_id)).await?;
    Ok(Json(record))
}

pub async fn delete_model(
    State(state): State<Arc<AppState>>,
    Path(model_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let store = Arc::clone(&state.store);
    let id = model_id.clone();
    if !blocking(move || store.delete(&id)).await? {
        return Err(ServerError::NotFound("Model not found".to_string()));
    }
    Ok(Json(json!({ "status": "deleted", "model_id": model_id })))
}

// ============================================================================
// Inference
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub model_id: String,
    #[serde(default)]
    pub instances: Vec<Instance>,
}

pub async fn predict(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<Prediction>> {
    let Json(request) = payload?;
    let prediction = blocking(move || state.inference.predict(&request.model_id, &request.instances)).await?;
    Ok(Json(prediction))
}
