//! Dataset storage
//!
//! Uploaded datasets are normalized to CSV and kept one file per id:
//!
//! ```text
//! data_dir/
//!   {dataset_id}.csv
//!   {dataset_id}.csv.meta.json   { "original_filename": ... }
//! ```

mod versioning;

pub use versioning::{DvcVersioning, NoopVersioning, RemoteVersioning, S3Credentials};

use crate::error::{MlopsError, Result};
use crate::store::{validate_id, write_atomic};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Cursor, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Source of training frames.
pub trait DatasetAccessor: Send + Sync {
    /// Load the full frame for `dataset_id`.
    ///
    /// Fails with `DatasetNotFound` when no such dataset exists and
    /// `DatasetReadError` when it exists but cannot be read.
    fn load(&self, dataset_id: &str) -> Result<DataFrame>;
}

/// Result of a successful upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedDataset {
    pub dataset_id: String,
    pub rows: usize,
    pub cols: usize,
    pub original_filename: Option<String>,
}

/// Listing entry for a stored dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub id: String,
    pub filename: String,
    pub size_bytes: u64,
    /// Last modification time, unix seconds
    pub created_at: i64,
    pub original_filename: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Sidecar {
    original_filename: Option<String>,
}

/// Filesystem dataset store
pub struct DatasetStore {
    data_dir: PathBuf,
    versioning: Arc<dyn RemoteVersioning>,
}

impl DatasetStore {
    /// Open a store at `data_dir`, creating the directory if needed
    pub fn open(data_dir: impl AsRef<Path>, versioning: Arc<dyn RemoteVersioning>) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir)?;
        Ok(Self {
            data_dir,
            versioning,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// CSV location for `dataset_id`
    pub fn dataset_path(&self, dataset_id: &str) -> PathBuf {
        self.data_dir.join(format!("{}.csv", dataset_id))
    }

    fn sidecar_path(csv_path: &Path) -> PathBuf {
        PathBuf::from(format!("{}.meta.json", csv_path.display()))
    }

    /// Parse an uploaded CSV or JSON document and store it under a new id.
    ///
    /// JSON is chosen when the content type mentions `json` or the file name
    /// ends in `.json`; anything else is read as CSV.
    pub fn upload(&self, bytes: &[u8], filename: Option<&str>, content_type: Option<&str>) -> Result<UploadedDataset> {
        let is_json = content_type.map(|ct| ct.contains("json")).unwrap_or(false)
            || filename
                .map(|f| f.to_lowercase().ends_with(".json"))
                .unwrap_or(false);

        let mut df = if is_json {
            parse_json(bytes)?
        } else {
            parse_csv(bytes)?
        };

        if df.height() == 0 || df.width() == 0 {
            return Err(MlopsError::EmptyDataset);
        }

        let dataset_id = uuid::Uuid::new_v4().simple().to_string();
        let path = self.dataset_path(&dataset_id);

        let mut buffer = Vec::new();
        CsvWriter::new(&mut buffer)
            .finish(&mut df)
            .map_err(|e| MlopsError::DataError(e.to_string()))?;
        write_atomic(&path, &buffer)?;

        let sidecar = Sidecar {
            original_filename: filename.map(|f| f.to_string()),
        };
        let sidecar_result = serde_json::to_vec_pretty(&sidecar)
            .map_err(MlopsError::from)
            .and_then(|b| fs::write(Self::sidecar_path(&path), b).map_err(MlopsError::from));
        if let Err(e) = sidecar_result {
            warn!(dataset_id = %dataset_id, error = %e, "Failed to write dataset sidecar");
        }

        if let Err(e) = self.versioning.add_and_push(&path) {
            warn!(path = %path.display(), error = %e, "Remote versioning add/push failed");
        }

        info!(
            dataset_id = %dataset_id,
            rows = df.height(),
            cols = df.width(),
            "Dataset uploaded"
        );

        Ok(UploadedDataset {
            dataset_id,
            rows: df.height(),
            cols: df.width(),
            original_filename: filename.map(|f| f.to_string()),
        })
    }

    /// Every stored dataset, sorted by file name
    pub fn list(&self) -> Result<Vec<DatasetInfo>> {
        let mut items = Vec::new();
        for entry in fs::read_dir(&self.data_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            let (Some(id), Some(filename)) = (
                path.file_stem().map(|s| s.to_string_lossy().to_string()),
                path.file_name().map(|s| s.to_string_lossy().to_string()),
            ) else {
                continue;
            };

            let meta = fs::metadata(&path)?;
            let created_at = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);

            let original_filename = fs::read(Self::sidecar_path(&path))
                .ok()
                .and_then(|b| serde_json::from_slice::<Sidecar>(&b).ok())
                .and_then(|s| s.original_filename)
                .filter(|name| !name.is_empty());

            items.push(DatasetInfo {
                id,
                filename,
                size_bytes: meta.len(),
                created_at,
                original_filename,
            });
        }
        items.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(items)
    }

    /// Remove a dataset and its sidecar; `false` if it did not exist
    pub fn delete(&self, dataset_id: &str) -> Result<bool> {
        if validate_id(dataset_id).is_err() {
            return Ok(false);
        }
        let path = self.dataset_path(dataset_id);

        if let Err(e) = self.versioning.remove_output(&path) {
            warn!(path = %path.display(), error = %e, "Remote versioning remove failed");
        }

        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        }
        match fs::remove_file(Self::sidecar_path(&path)) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(dataset_id = %dataset_id, error = %e, "Failed to remove dataset sidecar"),
        }

        info!(dataset_id = %dataset_id, "Dataset deleted");
        Ok(true)
    }
}

impl DatasetAccessor for DatasetStore {
    fn load(&self, dataset_id: &str) -> Result<DataFrame> {
        if validate_id(dataset_id).is_err() {
            return Err(MlopsError::DatasetNotFound(dataset_id.to_string()));
        }
        let path = self.dataset_path(dataset_id);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(MlopsError::DatasetNotFound(dataset_id.to_string()))
            }
            Err(e) => return Err(MlopsError::DatasetReadError(e.to_string())),
        };

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(None)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| MlopsError::DatasetReadError(e.to_string()))
    }
}

fn parse_csv(bytes: &[u8]) -> Result<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .into_reader_with_file_handle(Cursor::new(bytes.to_vec()))
        .finish()
        .map_err(|e| MlopsError::DatasetParseError(e.to_string()))
}

/// Accepts an array of records.
fn parse_json(bytes: &[u8]) -> Result<DataFrame> {
    let value: serde_json::Value = serde_json::from_slice(bytes)
        .map_err(|e| MlopsError::DatasetParseError(e.to_string()))?;
    match value {
        serde_json::Value::Array(ref rows) if rows.is_empty() => return Err(MlopsError::EmptyDataset),
        serde_json::Value::Array(_) => {}
        _ => {
            return Err(MlopsError::DatasetParseError(
                "expected a JSON array of records".to_string(),
            ))
        }
    }
    JsonReader::new(Cursor::new(bytes.to_vec()))
        .finish()
        .map_err(|e| MlopsError::DatasetParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> DatasetStore {
        DatasetStore::open(dir.path(), Arc::new(NoopVersioning)).unwrap()
    }

    #[test]
    fn test_upload_csv_and_load() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let csv = b"age,city,target\n30,paris,1\n40,oslo,0\n";
        let uploaded = store.upload(csv, Some("people.csv"), Some("text/csv")).unwrap();
        assert_eq!(uploaded.rows, 2);
        assert_eq!(uploaded.cols, 3);

        let df = store.load(&uploaded.dataset_id).unwrap();
        assert_eq!(df.shape(), (2, 3));
        assert_eq!(df.column("age").unwrap().dtype(), &DataType::Int64);
    }

    #[test]
    fn test_late_type_change_widens_column() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let mut csv = String::from("x,zip,target\n");
        for i in 0..150 {
            let x = if i < 120 { format!("{}", i) } else { format!("{}.5", i) };
            let zip = if i == 130 { "A1B2C".to_string() } else { format!("{}", 10000 + i) };
            csv.push_str(&format!("{},{},{}\n", x, zip, i % 2));
        }

        let uploaded = store.upload(csv.as_bytes(), Some("late.csv"), None).unwrap();
        assert_eq!(uploaded.rows, 150);

        let df = store.load(&uploaded.dataset_id).unwrap();
        assert_eq!(df.column("x").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("zip").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_upload_json_records() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let json = br#"[{"a": 1, "b": "x"}, {"a": 2, "b": "y"}, {"a": 3, "b": "x"}]"#;
        let uploaded = store.upload(json, Some("data.json"), None).unwrap();
        assert_eq!(uploaded.rows, 3);
        assert_eq!(uploaded.cols, 2);
    }

    #[test]
    fn test_upload_errors() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        assert!(matches!(
            store.upload(b"[]", None, Some("application/json")),
            Err(MlopsError::EmptyDataset)
        ));
        assert!(matches!(
            store.upload(b"{not json", None, Some("application/json")),
            Err(MlopsError::DatasetParseError(_))
        ));
        assert!(matches!(
            store.upload(b"a,b\n", Some("empty.csv"), None),
            Err(MlopsError::EmptyDataset)
        ));
    }

    #[test]
    fn test_list_and_delete() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let uploaded = store.upload(b"x,y\n1,2\n", Some("orig.csv"), None).unwrap();

        let items = store.list().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, uploaded.dataset_id);
        assert_eq!(items[0].original_filename.as_deref(), Some("orig.csv"));
        assert!(items[0].size_bytes > 0);

        assert!(store.delete(&uploaded.dataset_id).unwrap());
        assert!(!store.delete(&uploaded.dataset_id).unwrap());
        assert!(store.list().unwrap().is_empty());
        assert!(matches!(
            store.load(&uploaded.dataset_id),
            Err(MlopsError::DatasetNotFound(_))
        ));
    }

    #[test]
    fn test_unreadable_dataset() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        fs::create_dir(store.dataset_path("broken")).unwrap();
        let err = store.load("broken").unwrap_err();
        assert!(matches!(err, MlopsError::DatasetReadError(_)));
    }
}
