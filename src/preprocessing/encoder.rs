//! One-hot encoding of categorical columns

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One-hot encoder for a single column.
///
/// The vocabulary is the sorted set of values seen at fit time. A value
/// outside the vocabulary encodes to an all-zero block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OneHotEncoder {
    categories: Vec<String>,
}

impl OneHotEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit(&mut self, values: &[String]) -> &mut Self {
        let vocabulary: BTreeSet<&str> = values.iter().map(|v| v.as_str()).collect();
        self.categories = vocabulary.into_iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Width of the encoded block
    pub fn n_outputs(&self) -> usize {
        self.categories.len()
    }

    /// Index of the hot position for `value`, if it was seen at fit.
    pub fn position(&self, value: &str) -> Option<usize> {
        self.categories
            .binary_search_by(|c| c.as_str().cmp(value))
            .ok()
    }

    /// Output names as `{column}_{category}`
    pub fn output_names(&self, column: &str) -> Vec<String> {
        self.categories
            .iter()
            .map(|c| format!("{}_{}", column, c))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_sorted_vocabulary() {
        let mut encoder = OneHotEncoder::new();
        encoder.fit(&strings(&["paris", "berlin", "paris", "oslo"]));

        assert_eq!(encoder.categories(), &["berlin", "oslo", "paris"]);
        assert_eq!(encoder.n_outputs(), 3);
        assert_eq!(encoder.position("paris"), Some(2));
        assert_eq!(encoder.output_names("city")[0], "city_berlin");
    }

    #[test]
    fn test_unseen_category() {
        let mut encoder = OneHotEncoder::new();
        encoder.fit(&strings(&["a", "b"]));
        assert_eq!(encoder.position("c"), None);
    }
}
