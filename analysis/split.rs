//! Seeded train/test partitioning.
//!
//! Membership is decided once by sampling row indices without replacement from a
//! `StdRng` seeded with the configured value, so the same `(rows, fraction, seed)`
//! always yields the same partition.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum SplitError {
    #[error("Train fraction must lie strictly between 0 and 1, got {0}.")]
    InvalidFraction(f64),
    #[error(
        "Splitting {n_rows} rows with train fraction {fraction} leaves an empty partition (train {train}, test {test})."
    )]
    DegeneratePartition {
        n_rows: usize,
        fraction: f64,
        train: usize,
        test: usize,
    },
}

/// Disjoint, sorted row indices for the two partitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Number of training rows: `floor(train_fraction * n_rows)`, with a product that lands
/// within rounding error of an integer taken as that integer (`0.7 * 1460` is 1022).
pub fn train_size(n_rows: usize, train_fraction: f64) -> usize {
    let product = train_fraction * n_rows as f64;
    let nearest = product.round();
    if (product - nearest).abs() <= 1e-9 * nearest.max(1.0) {
        nearest as usize
    } else {
        product.floor() as usize
    }
}

/// Draws `train_size(n_rows, train_fraction)` training rows without replacement; the
/// remaining rows form the test partition.
pub fn train_test_split(
    n_rows: usize,
    train_fraction: f64,
    seed: u64,
) -> Result<Partition, SplitError> {
    if !(train_fraction > 0.0 && train_fraction < 1.0) {
        return Err(SplitError::InvalidFraction(train_fraction));
    }

    let train_len = train_size(n_rows, train_fraction);
    let test_len = n_rows - train_len;
    if train_len == 0 || test_len == 0 {
        return Err(SplitError::DegeneratePartition {
            n_rows,
            fraction: train_fraction,
            train: train_len,
            test: test_len,
        });
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = index::sample(&mut rng, n_rows, train_len).into_vec();
    train.sort_unstable();

    let mut in_train = vec![false; n_rows];
    for &i in &train {
        in_train[i] = true;
    }
    let test: Vec<usize> = (0..n_rows).filter(|&i| !in_train[i]).collect();

    log::info!(
        "Split {} rows into {} train and {} test rows (seed {}).",
        n_rows,
        train.len(),
        test.len(),
        seed
    );

    Ok(Partition { train, test })
}
