//! Target class labels

use crate::error::{MlopsError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One target value, kept in the dtype it had in the training frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClassLabel {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ClassLabel {
    fn rank(&self) -> u8 {
        match self {
            ClassLabel::Bool(_) => 0,
            ClassLabel::Int(_) => 1,
            ClassLabel::Float(_) => 2,
            ClassLabel::Str(_) => 3,
        }
    }

    /// Total order: by variant, then by value.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (ClassLabel::Bool(a), ClassLabel::Bool(b)) => a.cmp(b),
            (ClassLabel::Int(a), ClassLabel::Int(b)) => a.cmp(b),
            (ClassLabel::Float(a), ClassLabel::Float(b)) => a.total_cmp(b),
            (ClassLabel::Str(a), ClassLabel::Str(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ClassLabel::Bool(b) => serde_json::Value::Bool(*b),
            ClassLabel::Int(i) => serde_json::Value::from(*i),
            ClassLabel::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ClassLabel::Str(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl std::fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassLabel::Bool(b) => write!(f, "{}", b),
            ClassLabel::Int(i) => write!(f, "{}", i),
            ClassLabel::Float(v) => write!(f, "{}", v),
            ClassLabel::Str(s) => write!(f, "{}", s),
        }
    }
}

fn null_target(name: &str) -> MlopsError {
    MlopsError::ValidationError(format!("target column {} contains null values", name))
}

/// Read every value of a target column; nulls are rejected.
pub fn labels_from_column(column: &Column) -> Result<Vec<ClassLabel>> {
    let series = column.as_materialized_series();
    let name = series.name().to_string();
    if series.null_count() > 0 {
        return Err(null_target(&name));
    }

    match series.dtype() {
        DataType::Boolean => series
            .bool()?
            .into_iter()
            .map(|v| v.map(ClassLabel::Bool).ok_or_else(|| null_target(&name)))
            .collect(),
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => {
            let cast = series.cast(&DataType::Int64)?;
            cast.i64()?
                .into_iter()
                .map(|v| v.map(ClassLabel::Int).ok_or_else(|| null_target(&name)))
                .collect()
        }
        DataType::Float32 | DataType::Float64 => {
            let cast = series.cast(&DataType::Float64)?;
            cast.f64()?
                .into_iter()
                .map(|v| match v {
                    Some(f) if !f.is_nan() => Ok(ClassLabel::Float(f)),
                    _ => Err(null_target(&name)),
                })
                .collect()
        }
        _ => {
            let cast = series.cast(&DataType::String)?;
            cast.str()?
                .into_iter()
                .map(|v| {
                    v.map(|s| ClassLabel::Str(s.to_string()))
                        .ok_or_else(|| null_target(&name))
                })
                .collect()
        }
    }
}

/// Sorted distinct labels.
pub fn distinct_classes(labels: &[ClassLabel]) -> Vec<ClassLabel> {
    let mut classes = labels.to_vec();
    classes.sort_by(|a, b| a.total_cmp(b));
    classes.dedup_by(|a, b| a.total_cmp(b) == Ordering::Equal);
    classes
}

/// Position of each label inside `classes`.
pub fn encode_labels(labels: &[ClassLabel], classes: &[ClassLabel]) -> Result<Vec<usize>> {
    labels
        .iter()
        .map(|label| {
            classes
                .binary_search_by(|c| c.total_cmp(label))
                .map_err(|_| MlopsError::DataError(format!("label {} not among fitted classes", label)))
        })
        .collect()
}
