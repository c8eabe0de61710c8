//! Fitted-model dispatch over the supported estimator families

use crate::error::Result;
use super::linear_models::LogisticRegression;
use super::random_forest::RandomForest;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// One estimator of any registered family.
///
/// Targets are class indices encoded as `f64`; mapping back to the original
/// labels is the pipeline's job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Estimator {
    LogisticRegression(LogisticRegression),
    RandomForest(RandomForest),
}

impl Estimator {
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        match self {
            Estimator::LogisticRegression(m) => {
                m.fit(x, y)?;
            }
            Estimator::RandomForest(m) => {
                m.fit(x, y)?;
            }
        }
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            Estimator::LogisticRegression(m) => m.predict(x),
            Estimator::RandomForest(m) => m.predict(x),
        }
    }

    /// Probabilities with one column per entry of [`classes`](Self::classes).
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        match self {
            Estimator::LogisticRegression(m) => m.predict_proba(x),
            Estimator::RandomForest(m) => m.predict_proba(x),
        }
    }

    /// Encoded classes seen during fit.
    pub fn classes(&self) -> &[f64] {
        match self {
            Estimator::LogisticRegression(m) => m.classes(),
            Estimator::RandomForest(m) => m.classes(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Estimator::LogisticRegression(_) => "LogisticRegression",
            Estimator::RandomForest(_) => "RandomForest",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_dispatch_fit_predict() {
        let x = array![[0.0], [0.1], [0.9], [1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        for mut est in [
            Estimator::LogisticRegression(LogisticRegression::new().with_max_iter(500)),
            Estimator::RandomForest(RandomForest::new(5).with_random_state(Some(3))),
        ] {
            est.fit(&x, &y).unwrap();
            assert_eq!(est.classes(), &[0.0, 1.0]);
            assert_eq!(est.predict(&x).unwrap().len(), 4);
            assert_eq!(est.predict_proba(&x).unwrap().dim(), (4, 2));
        }
    }
}
