//! Column-aware feature transformer for mixed tabular frames

use crate::error::{MlopsError, Result};
use super::encoder::OneHotEncoder;
use super::imputer::{ImputeStrategy, Imputer};
use super::ColumnKind;
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Derives a [`ColumnPreprocessor`] from the schema of a feature frame.
pub struct PreprocessingBuilder;

impl PreprocessingBuilder {
    /// Unfitted transformer plus the exact input column order it expects.
    pub fn build(features: &DataFrame) -> (ColumnPreprocessor, Vec<String>) {
        let feature_order: Vec<String> = features
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect();
        let kinds = features
            .get_columns()
            .iter()
            .map(|col| ColumnKind::from_dtype(col.dtype()))
            .collect();

        let preprocessor = ColumnPreprocessor::new(feature_order.clone(), kinds);
        debug!(
            numeric = ?preprocessor.numeric_columns(),
            categorical = ?preprocessor.categorical_columns(),
            "Built column preprocessor"
        );
        (preprocessor, feature_order)
    }
}

/// Median-imputed numeric columns followed by most-frequent-imputed,
/// one-hot encoded categorical columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnPreprocessor {
    feature_order: Vec<String>,
    kinds: Vec<ColumnKind>,
    numeric_imputer: Imputer,
    categorical_imputer: Imputer,
    encoders: BTreeMap<String, OneHotEncoder>,
    is_fitted: bool,
}

impl ColumnPreprocessor {
    pub fn new(feature_order: Vec<String>, kinds: Vec<ColumnKind>) -> Self {
        Self {
            feature_order,
            kinds,
            numeric_imputer: Imputer::new(ImputeStrategy::Median),
            categorical_imputer: Imputer::new(ImputeStrategy::MostFrequent),
            encoders: BTreeMap::new(),
            is_fitted: false,
        }
    }

    pub fn feature_order(&self) -> &[String] {
        &self.feature_order
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn column_kind(&self, name: &str) -> Option<ColumnKind> {
        self.feature_order
            .iter()
            .position(|f| f == name)
            .map(|i| self.kinds[i])
    }

    fn columns_of(&self, kind: ColumnKind) -> Vec<String> {
        self.feature_order
            .iter()
            .zip(self.kinds.iter())
            .filter(|(_, k)| **k == kind)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn numeric_columns(&self) -> Vec<String> {
        self.columns_of(ColumnKind::Numeric)
    }

    pub fn categorical_columns(&self) -> Vec<String> {
        self.columns_of(ColumnKind::Categorical)
    }

    /// Learn imputation values and category vocabularies.
    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        let numeric = self.numeric_columns();
        let categorical = self.categorical_columns();

        self.numeric_imputer.fit(df, &numeric)?;
        self.categorical_imputer.fit(df, &categorical)?;

        self.encoders.clear();
        for name in &categorical {
            let values = self.categorical_imputer.transform_text(df, name)?;
            let mut encoder = OneHotEncoder::new();
            encoder.fit(&values);
            self.encoders.insert(name.clone(), encoder);
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Width of the transformed matrix.
    pub fn n_output_features(&self) -> usize {
        self.numeric_columns().len() + self.encoders.values().map(|e| e.n_outputs()).sum::<usize>()
    }

    /// Names of the transformed columns, in output order.
    pub fn output_names(&self) -> Vec<String> {
        let mut names = self.numeric_columns();
        for name in self.categorical_columns() {
            if let Some(encoder) = self.encoders.get(&name) {
                names.extend(encoder.output_names(&name));
            }
        }
        names
    }

    /// Dense feature matrix for `df`, which must carry every fitted column.
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(MlopsError::ModelNotFitted);
        }

        let n_rows = df.height();
        let mut columns: Vec<Vec<f64>> = Vec::with_capacity(self.n_output_features());

        for name in self.numeric_columns() {
            columns.push(self.numeric_imputer.transform_numeric(df, &name)?);
        }

        for name in self.categorical_columns() {
            let encoder = self.encoders.get(&name).ok_or(MlopsError::ModelNotFitted)?;
            let values = self.categorical_imputer.transform_text(df, &name)?;
            let mut block = vec![vec![0.0; n_rows]; encoder.n_outputs()];
            for (row, value) in values.iter().enumerate() {
                if let Some(pos) = encoder.position(value) {
                    block[pos][row] = 1.0;
                }
            }
            columns.extend(block);
        }

        let col_refs: Vec<&[f64]> = columns.iter().map(|c| c.as_slice()).collect();
        Ok(Array2::from_shape_fn((n_rows, col_refs.len()), |(r, c)| col_refs[c][r]))
    }

    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<Array2<f64>> {
        self.fit(df)?;
        self.transform(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DataFrame {
        df!(
            "age" => &[Some(20i64), None, Some(40), Some(30)],
            "city" => &[Some("paris"), Some("oslo"), None, Some("paris")],
            "member" => &[true, false, true, true]
        )
        .unwrap()
    }

    #[test]
    fn test_builder_kinds_and_order() {
        let df = frame();
        let (prep, order) = PreprocessingBuilder::build(&df);

        assert_eq!(order, vec!["age", "city", "member"]);
        assert_eq!(prep.column_kind("age"), Some(ColumnKind::Numeric));
        assert_eq!(prep.column_kind("city"), Some(ColumnKind::Categorical));
        assert_eq!(prep.column_kind("member"), Some(ColumnKind::Numeric));
        assert_eq!(prep.column_kind("nope"), None);
    }

    #[test]
    fn test_fit_transform_layout() {
        let df = frame();
        let (mut prep, _) = PreprocessingBuilder::build(&df);
        let x = prep.fit_transform(&df).unwrap();

        // age, member, city_oslo, city_paris
        assert_eq!(x.dim(), (4, 4));
        assert_eq!(prep.output_names(), vec!["age", "member", "city_oslo", "city_paris"]);
        assert_eq!(x[[1, 0]], 30.0);
        assert_eq!(x[[0, 1]], 1.0);
        assert_eq!(x[[1, 2]], 1.0);
        // missing city imputed with the most frequent value
        assert_eq!(x[[2, 3]], 1.0);
    }

    #[test]
    fn test_unseen_category_is_zero_block() {
        let df = frame();
        let (mut prep, _) = PreprocessingBuilder::build(&df);
        prep.fit(&df).unwrap();

        let new = df!(
            "age" => &[25i64],
            "city" => &["rome"],
            "member" => &[false]
        )
        .unwrap();
        let x = prep.transform(&new).unwrap();
        assert_eq!(x.row(0).to_vec(), vec![25.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_transform_before_fit() {
        let df = frame();
        let (prep, _) = PreprocessingBuilder::build(&df);
        assert!(matches!(prep.transform(&df), Err(MlopsError::ModelNotFitted)));
    }

    #[test]
    fn test_missing_column_on_transform() {
        let df = frame();
        let (mut prep, _) = PreprocessingBuilder::build(&df);
        prep.fit(&df).unwrap();
        let partial = df!("age" => &[1i64]).unwrap();
        assert!(matches!(
            prep.transform(&partial),
            Err(MlopsError::FeatureNotFound(_))
        ));
    }
}
