//! Fitted preprocessing + estimator unit persisted as one artifact

use crate::error::{MlopsError, Result};
use crate::preprocessing::ColumnPreprocessor;
use super::estimator::Estimator;
use super::labels::{encode_labels, ClassLabel};
use ndarray::{Array1, Array2};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

/// Preprocessor and estimator fitted together, plus the target classes in
/// the order used by probability columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    preprocessor: ColumnPreprocessor,
    estimator: Estimator,
    classes: Vec<ClassLabel>,
}

impl Pipeline {
    /// `classes` must be sorted and distinct, as produced by
    /// [`distinct_classes`](super::labels::distinct_classes).
    pub fn new(preprocessor: ColumnPreprocessor, estimator: Estimator, classes: Vec<ClassLabel>) -> Self {
        Self {
            preprocessor,
            estimator,
            classes,
        }
    }

    pub fn preprocessor(&self) -> &ColumnPreprocessor {
        &self.preprocessor
    }

    pub fn estimator(&self) -> &Estimator {
        &self.estimator
    }

    pub fn classes(&self) -> &[ClassLabel] {
        &self.classes
    }

    pub fn feature_order(&self) -> &[String] {
        self.preprocessor.feature_order()
    }

    /// Fit both stages on the same rows.
    pub fn fit(&mut self, x: &DataFrame, y: &[ClassLabel]) -> Result<&mut Self> {
        if x.height() != y.len() {
            return Err(MlopsError::ShapeError {
                expected: format!("{} labels", x.height()),
                actual: format!("{} labels", y.len()),
            });
        }
        let encoded: Array1<f64> = encode_labels(y, &self.classes)?
            .into_iter()
            .map(|i| i as f64)
            .collect();

        let xt = self.preprocessor.fit_transform(x)?;
        self.estimator.fit(&xt, &encoded)?;
        Ok(self)
    }

    /// Predicted class positions into [`classes`](Self::classes).
    pub fn predict_indices(&self, x: &DataFrame) -> Result<Vec<usize>> {
        let xt = self.preprocessor.transform(x)?;
        let raw = self.estimator.predict(&xt)?;
        raw.iter()
            .map(|&v| {
                let idx = v.round();
                if idx >= 0.0 && (idx as usize) < self.classes.len() {
                    Ok(idx as usize)
                } else {
                    Err(MlopsError::ComputationError(format!(
                        "estimator produced unknown class index {}",
                        v
                    )))
                }
            })
            .collect()
    }

    pub fn predict(&self, x: &DataFrame) -> Result<Vec<ClassLabel>> {
        Ok(self
            .predict_indices(x)?
            .into_iter()
            .map(|i| self.classes[i].clone())
            .collect())
    }

    /// One column per entry of [`classes`](Self::classes); classes absent
    /// from the training rows get probability zero.
    pub fn predict_proba(&self, x: &DataFrame) -> Result<Array2<f64>> {
        let xt = self.preprocessor.transform(x)?;
        let proba = self.estimator.predict_proba(&xt)?;
        let fitted = self.estimator.classes();

        let mut out = Array2::zeros((proba.nrows(), self.classes.len()));
        for (j, &encoded) in fitted.iter().enumerate() {
            let target = encoded.round() as usize;
            if target >= self.classes.len() {
                return Err(MlopsError::ComputationError(format!(
                    "estimator class {} outside fitted classes",
                    encoded
                )));
            }
            out.column_mut(target).assign(&proba.column(j));
        }
        Ok(out)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}
