//! Model training
//!
//! Classification estimators, the fitted pipeline that pairs them with
//! preprocessing, holdout evaluation and the end-to-end training run:
//! - Logistic regression (one-vs-rest, L2)
//! - Random forest over CART decision trees

mod estimator;
mod metrics;
mod orchestrator;
mod pipeline;
mod split;
pub mod decision_tree;
pub mod labels;
pub mod linear_models;
pub mod random_forest;

pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use estimator::Estimator;
pub use labels::ClassLabel;
pub use linear_models::LogisticRegression;
pub use metrics::classification_metrics;
pub use orchestrator::{TrainOutcome, TrainRequest, TrainingOrchestrator, DEFAULT_PROJECT};
pub use pipeline::Pipeline;
pub use random_forest::{MaxFeatures, RandomForest};
pub use split::{train_test_split, HoldoutSplit};
