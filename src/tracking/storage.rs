//! File-backed experiment tracker
//!
//! Every run is one JSON document at `base_dir/{project}/{run_id}.json`.

use crate::error::{MlopsError, Result};
use super::{ExperimentTracker, RunHandle};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Run lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Finished,
}

/// Artifact attached to a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedArtifact {
    pub artifact_id: String,
    pub name: String,
    pub path: String,
}

/// Persisted run document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedRun {
    pub run_id: String,
    pub project: String,
    pub name: String,
    pub params: serde_json::Value,
    pub metrics: BTreeMap<String, f64>,
    pub artifacts: Vec<TrackedArtifact>,
    pub status: RunStatus,
    pub started_at: String,
    pub ended_at: Option<String>,
}

/// Local file system tracker
pub struct LocalTracker {
    base_dir: PathBuf,
    lock: Mutex<()>,
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

fn project_dir_name(project: &str) -> String {
    project
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

impl LocalTracker {
    /// Create a tracker writing under `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        Ok(Self {
            base_dir,
            lock: Mutex::new(()),
        })
    }

    fn run_file(&self, project: &str, run_id: &str) -> PathBuf {
        self.base_dir
            .join(project_dir_name(project))
            .join(format!("{}.json", run_id))
    }

    /// Read back a stored run
    pub fn load_run(&self, run: &RunHandle) -> Result<TrackedRun> {
        let bytes = fs::read(self.run_file(&run.project, &run.run_id)).map_err(|e| {
            MlopsError::DataError(format!("Failed to read run {}: {}", run.run_id, e))
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// All runs recorded for `project`, oldest first
    pub fn list_runs(&self, project: &str) -> Result<Vec<TrackedRun>> {
        let dir = self.base_dir.join(project_dir_name(project));
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut runs = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                let run: TrackedRun = serde_json::from_slice(&fs::read(&path)?)?;
                runs.push(run);
            }
        }
        runs.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.run_id.cmp(&b.run_id)));
        Ok(runs)
    }

    fn save_run(&self, run: &TrackedRun) -> Result<()> {
        let path = self.run_file(&run.project, &run.run_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(run)?;
        crate::store::write_atomic(&path, &bytes)
    }

    fn update<F>(&self, handle: &RunHandle, f: F) -> Result<()>
    where
        F: FnOnce(&mut TrackedRun),
    {
        let _guard = self.lock.lock();
        let mut run = self.load_run(handle)?;
        f(&mut run);
        self.save_run(&run)
    }
}

impl ExperimentTracker for LocalTracker {
    fn start_run(&self, project: &str, name: &str, params: &serde_json::Value) -> Result<Option<RunHandle>> {
        let run = TrackedRun {
            run_id: uuid::Uuid::new_v4().simple().to_string(),
            project: project.to_string(),
            name: name.to_string(),
            params: params.clone(),
            metrics: BTreeMap::new(),
            artifacts: Vec::new(),
            status: RunStatus::Running,
            started_at: now(),
            ended_at: None,
        };
        {
            let _guard = self.lock.lock();
            self.save_run(&run)?;
        }
        debug!(run_id = %run.run_id, project = %project, name = %name, "Tracking run started");
        Ok(Some(RunHandle {
            run_id: run.run_id,
            project: run.project,
        }))
    }

    fn log_metrics(&self, run: &RunHandle, metrics: &BTreeMap<String, f64>) -> Result<()> {
        self.update(run, |r| {
            r.metrics.extend(metrics.iter().map(|(k, v)| (k.clone(), *v)));
        })
    }

    fn register_artifact(&self, run: &RunHandle, path: &Path, name: &str) -> Result<Option<String>> {
        let artifact_id = uuid::Uuid::new_v4().simple().to_string();
        let artifact = TrackedArtifact {
            artifact_id: artifact_id.clone(),
            name: name.to_string(),
            path: path.to_string_lossy().to_string(),
        };
        self.update(run, |r| r.artifacts.push(artifact))?;
        Ok(Some(artifact_id))
    }

    fn close_run(&self, run: &RunHandle) -> Result<()> {
        self.update(run, |r| {
            r.status = RunStatus::Finished;
            r.ended_at = Some(now());
        })
    }
}
