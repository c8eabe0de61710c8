//! Inference module
//!
//! Predictions for stored models from loosely typed JSON instances:
//! - Alignment to the fitted feature order (missing fields become nulls)
//! - Labels in the original target type
//! - Per-class probabilities for families that support them

mod engine;

pub use engine::{InferenceEngine, Instance, Prediction, UnknownFeaturePolicy};
