//! Remote version control of dataset files

use crate::error::{MlopsError, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Mirrors dataset files to remote storage.
///
/// Callers treat every failure as non-fatal.
pub trait RemoteVersioning: Send + Sync {
    /// One-time repository and remote setup.
    fn setup(&self) -> Result<()>;

    /// Start tracking `path` and push it to the remote.
    fn add_and_push(&self, path: &Path) -> Result<()>;

    /// Stop tracking `path`.
    fn remove_output(&self, path: &Path) -> Result<()>;
}

/// Versioning that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopVersioning;

impl RemoteVersioning for NoopVersioning {
    fn setup(&self) -> Result<()> {
        Ok(())
    }

    fn add_and_push(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    fn remove_output(&self, _path: &Path) -> Result<()> {
        Ok(())
    }
}

/// S3 credentials handed to the `dvc` process.
#[derive(Debug, Clone, Default)]
pub struct S3Credentials {
    pub endpoint_url: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Shells out to the `dvc` CLI.
#[derive(Debug, Clone)]
pub struct DvcVersioning {
    repo_root: PathBuf,
    remote_name: String,
    remote_url: String,
    s3: S3Credentials,
}

impl DvcVersioning {
    pub const DEFAULT_REMOTE_NAME: &'static str = "storage";

    pub fn new(repo_root: impl Into<PathBuf>, remote_url: impl Into<String>, s3: S3Credentials) -> Self {
        Self {
            repo_root: repo_root.into(),
            remote_name: Self::DEFAULT_REMOTE_NAME.to_string(),
            remote_url: remote_url.into(),
            s3,
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("dvc");
        cmd.args(args).current_dir(&self.repo_root);
        for (key, value) in [
            ("AWS_ACCESS_KEY_ID", self.s3.access_key_id.as_str()),
            ("AWS_SECRET_ACCESS_KEY", self.s3.secret_access_key.as_str()),
            ("AWS_ENDPOINT_URL", self.s3.endpoint_url.as_str()),
            ("AWS_DEFAULT_REGION", "us-east-1"),
        ] {
            if std::env::var_os(key).is_none() {
                cmd.env(key, value);
            }
        }
        cmd
    }

    /// Run `dvc args...` and return its stdout; a non-zero exit is an error.
    fn run(&self, args: &[&str]) -> Result<String> {
        debug!(args = ?args, "exec dvc");
        let output = self
            .command(args)
            .output()
            .map_err(|e| MlopsError::ComputationError(format!("failed to spawn dvc: {}", e)))?;
        if !output.status.success() {
            return Err(MlopsError::ComputationError(format!(
                "dvc {} exited with {}: {}",
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl RemoteVersioning for DvcVersioning {
    fn setup(&self) -> Result<()> {
        if !self.repo_root.join(".dvc").exists() {
            self.run(&["init", "--no-scm", "-q"])?;
            info!(root = %self.repo_root.display(), "DVC initialized (--no-scm)");
        }

        let remotes = self.command(&["remote", "list"]).output()?;
        let listed = String::from_utf8_lossy(&remotes.stdout);
        if !listed.contains(&self.remote_name) {
            let name = self.remote_name.as_str();
            self.run(&["remote", "add", "-f", name, &self.remote_url])?;
            self.run(&["remote", "modify", name, "endpointurl", &self.s3.endpoint_url])?;
            if !self.s3.access_key_id.is_empty() {
                self.run(&["remote", "modify", name, "access_key_id", &self.s3.access_key_id])?;
            }
            if !self.s3.secret_access_key.is_empty() {
                self.run(&["remote", "modify", name, "secret_access_key", &self.s3.secret_access_key])?;
            }
            info!(remote = %name, url = %self.remote_url, "DVC remote configured");
        }
        Ok(())
    }

    fn add_and_push(&self, path: &Path) -> Result<()> {
        let path_str = path.to_string_lossy();
        self.run(&["add", "-q", &path_str])?;
        self.run(&["push", "-q", "-r", &self.remote_name])?;
        info!(path = %path.display(), "DVC pushed");
        Ok(())
    }

    fn remove_output(&self, path: &Path) -> Result<()> {
        let dvc_meta = PathBuf::from(format!("{}.dvc", path.display()));
        if dvc_meta.exists() {
            let meta_str = dvc_meta.to_string_lossy();
            self.run(&["remove", "-q", "--outs", "--force", &meta_str])?;
            info!(path = %dvc_meta.display(), "DVC removed");
        }
        Ok(())
    }
}
