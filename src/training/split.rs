//! Holdout split

use crate::error::{MlopsError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Row indices of a train/test partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldoutSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Partition `n_samples` rows into train and test index sets.
///
/// `test_size` is the fraction of rows held out, `ceil(test_size * n)` of them.
/// With `shuffle` the rows are permuted by a ChaCha stream seeded with
/// `random_state`, so the same seed always yields the same partition. Without
/// it the last rows form the test set.
pub fn train_test_split(
    n_samples: usize,
    test_size: f64,
    shuffle: bool,
    random_state: u64,
) -> Result<HoldoutSplit> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(MlopsError::ValidationError(format!(
            "test_size must be in (0, 1), got {}",
            test_size
        )));
    }

    let n_test = (test_size * n_samples as f64).ceil() as usize;
    let n_train = n_samples.saturating_sub(n_test);
    if n_test == 0 || n_train == 0 {
        return Err(MlopsError::ValidationError(format!(
            "test_size={} with {} samples leaves an empty train or test set",
            test_size, n_samples
        )));
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    if shuffle {
        let mut rng = ChaCha8Rng::seed_from_u64(random_state);
        indices.shuffle(&mut rng);
    }

    let test = indices.split_off(n_train);
    Ok(HoldoutSplit {
        train: indices,
        test,
    })
}
