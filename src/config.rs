//! Service settings read from the environment

use crate::inference::UnknownFeaturePolicy;
use crate::registry::HyperparamPolicy;
use crate::training::DEFAULT_PROJECT;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

/// Runtime settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub env: String,
    pub log_level: String,
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub models_dir: PathBuf,
    /// Directory for run files; tracking is disabled when unset
    pub tracking_dir: Option<PathBuf>,
    pub tracking_project: String,
    pub dvc_enabled: bool,
    pub dvc_remote: String,
    pub s3_endpoint_url: String,
    pub s3_access_key_id: String,
    pub s3_secret_access_key: String,
    pub max_upload_size: usize,
    pub hyperparam_policy: HyperparamPolicy,
    pub unknown_feature_policy: UnknownFeaturePolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            env: "dev".to_string(),
            log_level: "info".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            data_dir: PathBuf::from("./data/datasets"),
            models_dir: PathBuf::from("./artifacts/models"),
            tracking_dir: None,
            tracking_project: DEFAULT_PROJECT.to_string(),
            dvc_enabled: false,
            dvc_remote: "s3://mlops".to_string(),
            s3_endpoint_url: "http://minio:9000".to_string(),
            s3_access_key_id: String::new(),
            s3_secret_access_key: String::new(),
            max_upload_size: 100 * 1024 * 1024, // 100MB
            hyperparam_policy: HyperparamPolicy::Lenient,
            unknown_feature_policy: UnknownFeaturePolicy::Ignore,
        }
    }
}

impl Settings {
    /// Read settings from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`; unparseable values keep the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            env: get("ENV").unwrap_or(d.env),
            log_level: get("LOG_LEVEL").map(|v| v.to_lowercase()).unwrap_or(d.log_level),
            host: get("API_HOST").unwrap_or(d.host),
            port: parsed(&get, "API_PORT", d.port),
            data_dir: get("DATA_DIR").map(PathBuf::from).unwrap_or(d.data_dir),
            models_dir: get("MODELS_DIR").map(PathBuf::from).unwrap_or(d.models_dir),
            tracking_dir: get("TRACKING_DIR").map(PathBuf::from),
            tracking_project: get("TRACKING_PROJECT").unwrap_or(d.tracking_project),
            dvc_enabled: flag(&get, "DVC_ENABLED", d.dvc_enabled),
            dvc_remote: get("DVC_REMOTE").unwrap_or(d.dvc_remote),
            s3_endpoint_url: get("S3_ENDPOINT_URL").unwrap_or(d.s3_endpoint_url),
            s3_access_key_id: get("S3_ACCESS_KEY_ID").unwrap_or(d.s3_access_key_id),
            s3_secret_access_key: get("S3_SECRET_ACCESS_KEY").unwrap_or(d.s3_secret_access_key),
            max_upload_size: parsed(&get, "MAX_UPLOAD_SIZE", d.max_upload_size),
            hyperparam_policy: parsed(&get, "HYPERPARAM_POLICY", d.hyperparam_policy),
            unknown_feature_policy: parsed(&get, "UNKNOWN_FEATURE_POLICY", d.unknown_feature_policy),
        }
    }
}

fn parsed<T, G>(get: &G, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key = %key, value = %raw, default = ?default, "Invalid setting, using default");
            default
        }),
        None => default,
    }
}

fn flag<G>(get: &G, key: &str, default: bool) -> bool
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.trim().to_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        Some(v) => {
            warn!(key = %key, value = %v, default, "Invalid flag, using default");
            default
        }
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Settings {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let s = settings(&[]);
        assert_eq!(s, Settings::default());
        assert_eq!(s.port, 8080);
        assert_eq!(s.max_upload_size, 100 * 1024 * 1024);
        assert!(s.tracking_dir.is_none());
        assert_eq!(s.tracking_project, "MLOps-HW01");
    }

    #[test]
    fn test_overrides() {
        let s = settings(&[
            ("API_PORT", "9000"),
            ("LOG_LEVEL", "DEBUG"),
            ("TRACKING_DIR", "/tmp/runs"),
            ("DVC_ENABLED", "true"),
            ("HYPERPARAM_POLICY", "strict"),
            ("UNKNOWN_FEATURE_POLICY", "reject"),
        ]);
        assert_eq!(s.port, 9000);
        assert_eq!(s.log_level, "debug");
        assert_eq!(s.tracking_dir, Some(PathBuf::from("/tmp/runs")));
        assert!(s.dvc_enabled);
        assert_eq!(s.hyperparam_policy, HyperparamPolicy::Strict);
        assert_eq!(s.unknown_feature_policy, UnknownFeaturePolicy::Reject);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let s = settings(&[
            ("API_PORT", "eighty"),
            ("MAX_UPLOAD_SIZE", "-1"),
            ("DVC_ENABLED", "maybe"),
            ("HYPERPARAM_POLICY", "whatever"),
            ("DATA_DIR", "  "),
        ]);
        assert_eq!(s.port, 8080);
        assert_eq!(s.max_upload_size, 100 * 1024 * 1024);
        assert!(!s.dvc_enabled);
        assert_eq!(s.hyperparam_policy, HyperparamPolicy::Lenient);
        assert_eq!(s.data_dir, PathBuf::from("./data/datasets"));
    }
}
