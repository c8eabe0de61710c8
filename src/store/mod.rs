//! Versioned model store
//!
//! Keeps one binary artifact per model next to a JSON index mapping every
//! model id to its metadata record:
//!
//! ```text
//! models_dir/
//!   index.json        { model_id -> TrainedModelRecord }
//!   {model_id}.bin    bincode-encoded Pipeline
//! ```
//!
//! Writers (`save`, `delete`) are serialized by an in-process mutex. Separate
//! processes sharing one directory still race on the index and the last
//! writer wins.

use crate::error::{MlopsError, Result};
use crate::registry::Hyperparams;
use crate::training::Pipeline;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const INDEX_FILE: &str = "index.json";
const ARTIFACT_EXT: &str = "bin";

/// Everything the trainer knows about a fit before it is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingMetadata {
    pub model_key: String,
    pub dataset_id: String,
    pub target_column: String,
    pub feature_order: Vec<String>,
    pub hyperparams: Hyperparams,
    pub metrics: BTreeMap<String, f64>,
    pub test_size: f64,
    pub shuffle: bool,
    pub random_state: u64,
}

/// One entry of the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModelRecord {
    pub model_id: String,
    pub model_key: String,
    pub dataset_id: String,
    pub target_column: String,
    /// Input columns in the exact order the pipeline was fitted with
    pub feature_order: Vec<String>,
    /// Effective hyperparameters after sanitization
    pub hyperparams: Hyperparams,
    pub metrics: BTreeMap<String, f64>,
    /// RFC 3339 UTC, second precision
    pub created_at: String,
    pub artifact_path: String,
    pub test_size: f64,
    pub shuffle: bool,
    pub random_state: u64,
}

impl TrainedModelRecord {
    fn from_metadata(model_id: String, artifact_path: String, created_at: String, meta: TrainingMetadata) -> Self {
        Self {
            model_id,
            model_key: meta.model_key,
            dataset_id: meta.dataset_id,
            target_column: meta.target_column,
            feature_order: meta.feature_order,
            hyperparams: meta.hyperparams,
            metrics: meta.metrics,
            created_at,
            artifact_path,
            test_size: meta.test_size,
            shuffle: meta.shuffle,
            random_state: meta.random_state,
        }
    }
}

type Index = BTreeMap<String, TrainedModelRecord>;

/// Ids double as file names, so only `[A-Za-z0-9_-]` is accepted.
pub fn validate_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(MlopsError::ValidationError(format!(
            "invalid id {:?}: only letters, digits, '_' and '-' are allowed",
            id
        )))
    }
}

/// Write `bytes` to a hidden temp file next to `path` and return its location.
fn stage(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4().simple()));
    if let Err(e) = fs::write(&tmp, bytes) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(tmp)
}

/// Write `bytes` next to `path` and rename over it.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = stage(path, bytes)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

/// Durable store of trained pipelines and their metadata.
pub struct ModelStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl ModelStore {
    /// Open (creating if needed) a store rooted at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        let store = Self {
            root,
            write_lock: Mutex::new(()),
        };
        if !store.index_path().exists() {
            store.write_index(&Index::new())?;
        }
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    /// Fixed artifact location for `model_id`.
    pub fn artifact_path(&self, model_id: &str) -> PathBuf {
        self.root.join(format!("{}.{}", model_id, ARTIFACT_EXT))
    }

    fn read_index(&self) -> Result<Index> {
        match fs::read(self.index_path()) {
            Ok(bytes) if bytes.iter().all(|b| b.is_ascii_whitespace()) => Ok(Index::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Index::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_index(&self, index: &Index) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(index)?;
        write_atomic(&self.index_path(), &bytes)
    }

    /// Persist a fitted pipeline and return its id.
    ///
    /// A fresh hex id is allocated when `model_id` is `None`; an existing id
    /// is overwritten in place, artifact and record both.
    ///
    /// The artifact is staged first, the index is committed, and only then is
    /// the staged file renamed onto `{id}.bin`. A failure at any step leaves
    /// the previous artifact and record untouched.
    pub fn save(&self, pipeline: &Pipeline, meta: TrainingMetadata, model_id: Option<&str>) -> Result<String> {
        self.save_with(pipeline, meta, model_id, |index| self.write_index(index))
    }

    fn save_with<F>(
        &self,
        pipeline: &Pipeline,
        meta: TrainingMetadata,
        model_id: Option<&str>,
        commit_index: F,
    ) -> Result<String>
    where
        F: FnOnce(&Index) -> Result<()>,
    {
        let model_id = match model_id {
            Some(id) => {
                validate_id(id)?;
                id.to_string()
            }
            None => uuid::Uuid::new_v4().simple().to_string(),
        };

        let bytes = pipeline.to_bytes()?;
        let path = self.artifact_path(&model_id);

        let _guard = self.write_lock.lock();
        let mut index = self.read_index()?;
        let previous = index.clone();
        let is_new = !index.contains_key(&model_id);

        let staged = stage(&path, &bytes)?;

        let created_at = chrono::Utc::now()
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        let record = TrainedModelRecord::from_metadata(
            model_id.clone(),
            path.to_string_lossy().to_string(),
            created_at,
            meta,
        );
        index.insert(model_id.clone(), record);

        if let Err(e) = commit_index(&index) {
            discard(&staged);
            return Err(e);
        }

        if let Err(e) = fs::rename(&staged, &path) {
            discard(&staged);
            if let Err(rollback) = self.write_index(&previous) {
                warn!(model_id = %model_id, error = %rollback, "Failed to roll back model index");
            }
            return Err(e.into());
        }

        info!(
            model_id = %model_id,
            artifact = %path.display(),
            size_bytes = bytes.len(),
            overwritten = !is_new,
            "Model saved"
        );
        Ok(model_id)
    }

    /// Load the pipeline and record for `model_id`.
    pub fn load(&self, model_id: &str) -> Result<(Pipeline, TrainedModelRecord)> {
        let record = self.get(model_id)?;
        let bytes = match fs::read(self.artifact_path(model_id)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(model_id = %model_id, "Artifact missing for indexed model");
                return Err(MlopsError::ModelNotFound(model_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let pipeline = Pipeline::from_bytes(&bytes)?;
        Ok((pipeline, record))
    }

    /// Metadata record for `model_id`.
    pub fn get(&self, model_id: &str) -> Result<TrainedModelRecord> {
        self.read_index()?
            .remove(model_id)
            .ok_or_else(|| MlopsError::ModelNotFound(model_id.to_string()))
    }

    /// All records, ordered by id.
    pub fn list(&self) -> Result<Vec<TrainedModelRecord>> {
        Ok(self.read_index()?.into_values().collect())
    }

    /// Remove the record and the artifact; `true` if either existed.
    pub fn delete(&self, model_id: &str) -> Result<bool> {
        if validate_id(model_id).is_err() {
            return Ok(false);
        }

        let _guard = self.write_lock.lock();
        let mut index = self.read_index()?;
        let mut existed = false;

        if index.remove(model_id).is_some() {
            existed = true;
            self.write_index(&index)?;
        }

        match fs::remove_file(self.artifact_path(model_id)) {
            Ok(()) => existed = true,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        if existed {
            info!(model_id = %model_id, "Model deleted");
        }
        Ok(existed)
    }
}

fn discard(staged: &Path) {
    if let Err(e) = fs::remove_file(staged) {
        warn!(path = %staged.display(), error = %e, "Failed to remove staged artifact");
    }
}
