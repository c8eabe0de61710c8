//! Missing value imputation

use crate::error::{MlopsError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Strategy for filling missing values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImputeStrategy {
    /// Median of the observed numeric values
    Median,
    /// Most frequent observed value, read as text
    MostFrequent,
}

/// Learned fill value for one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FillValue {
    Number(f64),
    Text(String),
}

/// Column-wise imputer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Imputer {
    strategy: ImputeStrategy,
    fill_values: BTreeMap<String, FillValue>,
}

/// Fill for a numeric column with no observed values.
const EMPTY_NUMERIC_FILL: f64 = 0.0;
/// Fill for a text column with no observed values.
const EMPTY_TEXT_FILL: &str = "missing";

pub(crate) fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|_| MlopsError::FeatureNotFound(name.to_string()))?;
    let series = column.as_materialized_series().cast(&DataType::Float64)?;
    Ok(series
        .f64()?
        .into_iter()
        .map(|v| v.filter(|f| !f.is_nan()))
        .collect())
}

pub(crate) fn text_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|_| MlopsError::FeatureNotFound(name.to_string()))?;
    let series = column.as_materialized_series().cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect())
}

impl Imputer {
    /// Create a new imputer
    pub fn new(strategy: ImputeStrategy) -> Self {
        Self {
            strategy,
            fill_values: BTreeMap::new(),
        }
    }

    pub fn strategy(&self) -> ImputeStrategy {
        self.strategy
    }

    /// Learn one fill value per column
    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        self.fill_values.clear();
        for name in columns {
            let fill = match self.strategy {
                ImputeStrategy::Median => {
                    let observed: Vec<f64> = numeric_values(df, name)?.into_iter().flatten().collect();
                    FillValue::Number(median(observed).unwrap_or(EMPTY_NUMERIC_FILL))
                }
                ImputeStrategy::MostFrequent => {
                    let observed: Vec<String> = text_values(df, name)?.into_iter().flatten().collect();
                    FillValue::Text(
                        most_frequent(&observed).unwrap_or_else(|| EMPTY_TEXT_FILL.to_string()),
                    )
                }
            };
            self.fill_values.insert(name.clone(), fill);
        }
        Ok(self)
    }

    pub fn fill_value(&self, name: &str) -> Option<&FillValue> {
        self.fill_values.get(name)
    }

    /// Imputed numeric values of `name`
    pub fn transform_numeric(&self, df: &DataFrame, name: &str) -> Result<Vec<f64>> {
        let fill = match self.fill_values.get(name) {
            Some(FillValue::Number(v)) => *v,
            Some(FillValue::Text(_)) => {
                return Err(MlopsError::DataError(format!("column {} was fitted as text", name)))
            }
            None => return Err(MlopsError::ModelNotFitted),
        };
        Ok(numeric_values(df, name)?
            .into_iter()
            .map(|v| v.unwrap_or(fill))
            .collect())
    }

    /// Imputed text values of `name`
    pub fn transform_text(&self, df: &DataFrame, name: &str) -> Result<Vec<String>> {
        let fill = match self.fill_values.get(name) {
            Some(FillValue::Text(v)) => v,
            Some(FillValue::Number(_)) => {
                return Err(MlopsError::DataError(format!("column {} was fitted as numeric", name)))
            }
            None => return Err(MlopsError::ModelNotFitted),
        };
        Ok(text_values(df, name)?
            .into_iter()
            .map(|v| v.unwrap_or_else(|| fill.clone()))
            .collect())
    }
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Ties go to the lexicographically smallest value.
fn most_frequent(values: &[String]) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for v in values {
        *counts.entry(v.as_str()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|(a_val, a_count), (b_val, b_count)| {
            a_count.cmp(b_count).then_with(|| b_val.cmp(a_val))
        })
        .map(|(v, _)| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_imputer() {
        let df = df!("age" => &[Some(10i64), None, Some(30), Some(20)]).unwrap();
        let mut imputer = Imputer::new(ImputeStrategy::Median);
        imputer.fit(&df, &["age".to_string()]).unwrap();

        assert_eq!(imputer.fill_value("age"), Some(&FillValue::Number(20.0)));
        assert_eq!(
            imputer.transform_numeric(&df, "age").unwrap(),
            vec![10.0, 20.0, 30.0, 20.0]
        );
    }

    #[test]
    fn test_most_frequent_imputer() {
        let df = df!("city" => &[Some("b"), Some("a"), None, Some("b"), Some("a")]).unwrap();
        let mut imputer = Imputer::new(ImputeStrategy::MostFrequent);
        imputer.fit(&df, &["city".to_string()]).unwrap();

        // tie between a and b resolves to a
        assert_eq!(imputer.transform_text(&df, "city").unwrap()[2], "a");
    }

    #[test]
    fn test_all_null_column() {
        let df = df!("x" => &[None::<f64>, None]).unwrap();
        let mut imputer = Imputer::new(ImputeStrategy::Median);
        imputer.fit(&df, &["x".to_string()]).unwrap();
        assert_eq!(imputer.transform_numeric(&df, "x").unwrap(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_unfitted_column() {
        let df = df!("x" => &[1.0]).unwrap();
        let imputer = Imputer::new(ImputeStrategy::Median);
        assert!(matches!(
            imputer.transform_numeric(&df, "x"),
            Err(MlopsError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_missing_column() {
        let df = df!("x" => &[1.0]).unwrap();
        let mut imputer = Imputer::new(ImputeStrategy::Median);
        assert!(matches!(
            imputer.fit(&df, &["y".to_string()]),
            Err(MlopsError::FeatureNotFound(_))
        ));
    }
}
