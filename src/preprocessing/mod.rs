//! Feature preprocessing
//!
//! Turns a mixed-dtype feature frame into a dense numeric matrix:
//! - Median imputation for numeric columns
//! - Most-frequent imputation and one-hot encoding for everything else

mod column_transformer;
mod encoder;
mod imputer;

pub use column_transformer::{ColumnPreprocessor, PreprocessingBuilder};
pub use encoder::OneHotEncoder;
pub use imputer::{FillValue, ImputeStrategy, Imputer};

use polars::prelude::DataType;
use serde::{Deserialize, Serialize};

/// How a feature column is treated by the preprocessor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    /// Integers, floats and booleans
    Numeric,
    /// Any other dtype, read as text
    Categorical,
}

impl ColumnKind {
    pub fn from_dtype(dtype: &DataType) -> Self {
        match dtype {
            DataType::Boolean
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64 => ColumnKind::Numeric,
            _ => ColumnKind::Categorical,
        }
    }
}
