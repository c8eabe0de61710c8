//! Typed reads out of a hyperparameter map

use crate::error::{MlopsError, Result};
use crate::training::MaxFeatures;
use super::Hyperparams;
use serde_json::Value;

fn invalid(key: &str, expected: &str, value: &Value) -> MlopsError {
    MlopsError::ValidationError(format!(
        "hyperparameter {} must be {}, got {}",
        key, expected, value
    ))
}

fn required<'a>(params: &'a Hyperparams, key: &str) -> Result<&'a Value> {
    params
        .get(key)
        .ok_or_else(|| MlopsError::ValidationError(format!("missing hyperparameter {}", key)))
}

/// Finite number strictly greater than zero.
pub(crate) fn positive_f64(params: &Hyperparams, key: &str) -> Result<f64> {
    let value = required(params, key)?;
    match value.as_f64() {
        Some(v) if v.is_finite() && v > 0.0 => Ok(v),
        _ => Err(invalid(key, "a positive number", value)),
    }
}

/// Integer at least `min`.
pub(crate) fn usize_at_least(params: &Hyperparams, key: &str, min: usize) -> Result<usize> {
    let value = required(params, key)?;
    match value.as_u64() {
        Some(v) if v as usize >= min => Ok(v as usize),
        _ => Err(invalid(key, &format!("an integer >= {}", min), value)),
    }
}

/// `null` or a positive integer.
pub(crate) fn optional_positive_usize(params: &Hyperparams, key: &str) -> Result<Option<usize>> {
    let value = required(params, key)?;
    match value {
        Value::Null => Ok(None),
        v => match v.as_u64() {
            Some(n) if n > 0 => Ok(Some(n as usize)),
            _ => Err(invalid(key, "null or a positive integer", value)),
        },
    }
}

/// `null` or a non-negative integer seed.
pub(crate) fn optional_seed(params: &Hyperparams, key: &str) -> Result<Option<u64>> {
    let value = required(params, key)?;
    match value {
        Value::Null => Ok(None),
        v => v
            .as_u64()
            .map(Some)
            .ok_or_else(|| invalid(key, "null or a non-negative integer", value)),
    }
}

pub(crate) fn boolean(params: &Hyperparams, key: &str) -> Result<bool> {
    let value = required(params, key)?;
    value.as_bool().ok_or_else(|| invalid(key, "a boolean", value))
}

/// `-1` means every core, a positive count sizes a dedicated pool.
pub(crate) fn n_jobs(params: &Hyperparams, key: &str) -> Result<Option<usize>> {
    let value = required(params, key)?;
    match value {
        Value::Null => Ok(None),
        v => match v.as_i64() {
            Some(-1) => Ok(None),
            Some(n) if n > 0 => Ok(Some(n as usize)),
            _ => Err(invalid(key, "-1 or a positive integer", value)),
        },
    }
}

/// `"sqrt"`, `"log2"`, `null` (all features), an integer count or a fraction in `(0, 1]`.
pub(crate) fn max_features(params: &Hyperparams, key: &str) -> Result<MaxFeatures> {
    let value = required(params, key)?;
    match value {
        Value::Null => Ok(MaxFeatures::All),
        Value::String(s) => match s.as_str() {
            "sqrt" => Ok(MaxFeatures::Sqrt),
            "log2" => Ok(MaxFeatures::Log2),
            _ => Err(invalid(key, "\"sqrt\", \"log2\", null or a number", value)),
        },
        Value::Number(n) => {
            if let Some(count) = n.as_u64() {
                if count > 0 {
                    return Ok(MaxFeatures::Fixed(count as usize));
                }
            } else if let Some(fraction) = n.as_f64() {
                if fraction > 0.0 && fraction <= 1.0 {
                    return Ok(MaxFeatures::Fraction(fraction));
                }
            }
            Err(invalid(key, "a positive count or a fraction in (0, 1]", value))
        }
        _ => Err(invalid(key, "\"sqrt\", \"log2\", null or a number", value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, Value)]) -> Hyperparams {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_positive_f64() {
        assert_eq!(positive_f64(&params(&[("C", json!(2))]), "C").unwrap(), 2.0);
        assert!(positive_f64(&params(&[("C", json!(0.0))]), "C").is_err());
        assert!(positive_f64(&params(&[("C", json!("big"))]), "C").is_err());
    }

    #[test]
    fn test_n_jobs() {
        assert_eq!(n_jobs(&params(&[("n_jobs", json!(-1))]), "n_jobs").unwrap(), None);
        assert_eq!(n_jobs(&params(&[("n_jobs", json!(4))]), "n_jobs").unwrap(), Some(4));
        assert!(n_jobs(&params(&[("n_jobs", json!(0))]), "n_jobs").is_err());
        assert!(n_jobs(&params(&[("n_jobs", json!(-3))]), "n_jobs").is_err());
    }

    #[test]
    fn test_max_features_forms() {
        let read = |v: Value| max_features(&params(&[("max_features", v)]), "max_features");
        assert_eq!(read(json!("sqrt")).unwrap(), MaxFeatures::Sqrt);
        assert_eq!(read(json!("log2")).unwrap(), MaxFeatures::Log2);
        assert_eq!(read(Value::Null).unwrap(), MaxFeatures::All);
        assert_eq!(read(json!(3)).unwrap(), MaxFeatures::Fixed(3));
        assert_eq!(read(json!(0.5)).unwrap(), MaxFeatures::Fraction(0.5));
        assert!(read(json!("auto")).is_err());
        assert!(read(json!(1.5)).is_err());
        assert!(read(json!(0)).is_err());
    }

    #[test]
    fn test_optional_values() {
        let p = params(&[("max_depth", Value::Null), ("random_state", json!(7))]);
        assert_eq!(optional_positive_usize(&p, "max_depth").unwrap(), None);
        assert_eq!(optional_seed(&p, "random_state").unwrap(), Some(7));
        assert!(optional_seed(&params(&[("random_state", json!(-1))]), "random_state").is_err());
    }

    #[test]
    fn test_missing_key() {
        assert!(boolean(&Hyperparams::new(), "fit_intercept").is_err());
    }
}
