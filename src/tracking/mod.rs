//! Experiment tracking
//!
//! Training reports each run to an [`ExperimentTracker`]. Tracking is
//! best-effort: the caller logs tracker errors and carries on.

mod storage;

pub use storage::{LocalTracker, RunStatus, TrackedArtifact, TrackedRun};

use crate::error::Result;
use std::collections::BTreeMap;
use std::path::Path;

/// Reference to an open run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHandle {
    pub run_id: String,
    pub project: String,
}

/// Sink for training runs, their metrics and produced artifacts.
pub trait ExperimentTracker: Send + Sync {
    /// Open a run; `None` when the tracker is not accepting runs.
    fn start_run(&self, project: &str, name: &str, params: &serde_json::Value) -> Result<Option<RunHandle>>;

    fn log_metrics(&self, run: &RunHandle, metrics: &BTreeMap<String, f64>) -> Result<()>;

    /// Attach a file to the run; returns the tracker's artifact id.
    fn register_artifact(&self, run: &RunHandle, path: &Path, name: &str) -> Result<Option<String>>;

    fn close_run(&self, run: &RunHandle) -> Result<()>;
}

/// Tracker that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracker;

impl ExperimentTracker for NoopTracker {
    fn start_run(&self, _project: &str, _name: &str, _params: &serde_json::Value) -> Result<Option<RunHandle>> {
        Ok(None)
    }

    fn log_metrics(&self, _run: &RunHandle, _metrics: &BTreeMap<String, f64>) -> Result<()> {
        Ok(())
    }

    fn register_artifact(&self, _run: &RunHandle, _path: &Path, _name: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn close_run(&self, _run: &RunHandle) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_tracker_opens_nothing() {
        let tracker = NoopTracker;
        let run = tracker
            .start_run("proj", "train/x", &serde_json::json!({}))
            .unwrap();
        assert!(run.is_none());
    }
}
