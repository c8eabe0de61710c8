//! Linear classifier implementation

use crate::error::{MlopsError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Logistic regression classifier.
///
/// Trained with batch gradient descent on standardized inputs. Two classes
/// use a single sigmoid model; more classes are fitted one-vs-rest and the
/// per-class scores are normalized into probabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Inverse regularization strength (L2 penalty is `1 / (C * n_samples)`)
    pub c: f64,
    /// Maximum gradient descent iterations
    pub max_iter: usize,
    /// Convergence tolerance on the gradient norm
    pub tol: f64,
    /// Gradient descent step size
    pub learning_rate: f64,
    /// Whether to fit intercept
    pub fit_intercept: bool,
    /// One row of weights per fitted binary model
    coefficients: Option<Array2<f64>>,
    /// One intercept per fitted binary model
    intercepts: Option<Array1<f64>>,
    /// Column means used for standardization
    means: Option<Array1<f64>>,
    /// Column scales used for standardization
    scales: Option<Array1<f64>>,
    /// Sorted class values seen during fit
    classes: Vec<f64>,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    /// Create a new logistic regression model
    pub fn new() -> Self {
        Self {
            c: 1.0,
            max_iter: 200,
            tol: 1e-4,
            learning_rate: 0.5,
            fit_intercept: true,
            coefficients: None,
            intercepts: None,
            means: None,
            scales: None,
            classes: Vec::new(),
        }
    }

    /// Set inverse regularization strength
    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set convergence tolerance
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Set learning rate
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Enable or disable the intercept term
    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    /// Classes seen during fit, in probability column order
    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    pub fn is_fitted(&self) -> bool {
        self.coefficients.is_some()
    }

    fn sigmoid(z: &Array1<f64>) -> Array1<f64> {
        z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
    }

    fn standardize(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (means, scales) = match (&self.means, &self.scales) {
            (Some(m), Some(s)) => (m, s),
            _ => return Err(MlopsError::ModelNotFitted),
        };
        if x.ncols() != means.len() {
            return Err(MlopsError::ShapeError {
                expected: format!("{} features", means.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok((x - means) / scales)
    }

    /// Fit the model; `y` holds class values (any distinct floats).
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(MlopsError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(MlopsError::ValidationError(
                "cannot fit on an empty training set".to_string(),
            ));
        }

        let mut classes: Vec<f64> = y.iter().copied().collect();
        classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        classes.dedup();
        if classes.len() < 2 {
            return Err(MlopsError::ValidationError(format!(
                "logistic regression needs at least 2 classes, got {}",
                classes.len()
            )));
        }

        let means = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(n_features));
        let scales = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 1e-12 { s } else { 1.0 });
        self.means = Some(means);
        self.scales = Some(scales);
        let xs = self.standardize(x)?;

        // Binary problems fit only the positive class.
        let targets: Vec<f64> = if classes.len() == 2 {
            vec![classes[1]]
        } else {
            classes.clone()
        };

        let mut coefficients = Array2::zeros((targets.len(), n_features));
        let mut intercepts = Array1::zeros(targets.len());
        for (k, &positive) in targets.iter().enumerate() {
            let y_bin = y.mapv(|v| if v == positive { 1.0 } else { 0.0 });
            let (w, b) = self.gradient_descent(&xs, &y_bin);
            coefficients.row_mut(k).assign(&w);
            intercepts[k] = b;
        }

        self.coefficients = Some(coefficients);
        self.intercepts = Some(intercepts);
        self.classes = classes;

        Ok(self)
    }

    fn gradient_descent(&self, x: &Array2<f64>, y: &Array1<f64>) -> (Array1<f64>, f64) {
        let n_samples = x.nrows() as f64;
        let mut weights = Array1::zeros(x.ncols());
        let mut bias = 0.0;

        let lr = self.learning_rate;
        let alpha = 1.0 / (self.c * n_samples);

        for _iter in 0..self.max_iter {
            let linear = x.dot(&weights) + bias;
            let predictions = Self::sigmoid(&linear);

            let errors = &predictions - y;
            let dw = (x.t().dot(&errors) / n_samples) + (alpha * &weights);
            let db = if self.fit_intercept {
                errors.mean().unwrap_or(0.0)
            } else {
                0.0
            };

            let grad_norm = (dw.mapv(|v| v * v).sum() + db * db).sqrt();
            if grad_norm < self.tol {
                break;
            }

            weights = weights - lr * dw;
            bias -= lr * db;
        }

        (weights, bias)
    }

    /// Predict class probabilities, one column per entry of [`classes`](Self::classes)
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (coefficients, intercepts) = match (&self.coefficients, &self.intercepts) {
            (Some(c), Some(i)) => (c, i),
            _ => return Err(MlopsError::ModelNotFitted),
        };
        let xs = self.standardize(x)?;
        let n = xs.nrows();

        if self.classes.len() == 2 {
            let p = Self::sigmoid(&(xs.dot(&coefficients.row(0)) + intercepts[0]));
            let mut out = Array2::zeros((n, 2));
            for (i, &pi) in p.iter().enumerate() {
                out[[i, 0]] = 1.0 - pi;
                out[[i, 1]] = pi;
            }
            return Ok(out);
        }

        let k = self.classes.len();
        let mut out = Array2::zeros((n, k));
        for j in 0..k {
            let p = Self::sigmoid(&(xs.dot(&coefficients.row(j)) + intercepts[j]));
            out.column_mut(j).assign(&p);
        }
        for mut row in out.rows_mut() {
            let sum = row.sum();
            if sum > 0.0 {
                row /= sum;
            } else {
                row.fill(1.0 / k as f64);
            }
        }
        Ok(out)
    }

    /// Predict class values
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .rows()
            .into_iter()
            .map(|row| self.classes[argmax(row.iter().copied())])
            .collect())
    }

    /// Get accuracy score
    pub fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        let y_pred = self.predict(x)?;

        let correct = y_pred
            .iter()
            .zip(y.iter())
            .filter(|(pred, actual)| (*pred - *actual).abs() < 0.5)
            .count();

        Ok(correct as f64 / y.len() as f64)
    }
}

/// Index of the largest value; the first one wins ties.
pub(crate) fn argmax(values: impl Iterator<Item = f64>) -> usize {
    let mut best = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (i, v) in values.enumerate() {
        if v > best_value {
            best = i;
            best_value = v;
        }
    }
    best
}
