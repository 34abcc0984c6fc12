//! Train/test partitioning of the aggregate table

use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::AggregateRecord;
use crate::snapshot::write_snapshot;

pub const DEFAULT_TEST_SIZE: f64 = 0.2;
pub const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum SplitStrategy {
    /// Chronological cut; the most recent days form the test set
    Time,
    Random { seed: u64 },
}

impl Default for SplitStrategy {
    fn default() -> Self {
        SplitStrategy::Time
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub train: Vec<AggregateRecord>,
    pub test: Vec<AggregateRecord>,
}

/// Partition records into training and test sets
///
/// Records are ordered by date first. The training set receives
/// `floor(n * (1 - test_size))` records.
pub fn train_test_split(
    records: &[AggregateRecord],
    test_size: f64,
    strategy: SplitStrategy,
) -> Result<Split> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(Error::data(
            "test_size",
            format!("must be within (0, 1), got {}", test_size),
        ));
    }

    let mut ordered = records.to_vec();
    ordered.sort_by_key(|r| r.date);
    let train_len = (ordered.len() as f64 * (1.0 - test_size)).floor() as usize;

    match strategy {
        SplitStrategy::Time => {
            let test = ordered.split_off(train_len);
            Ok(Split {
                train: ordered,
                test,
            })
        }
        SplitStrategy::Random { seed } => {
            let mut indices: Vec<usize> = (0..ordered.len()).collect();
            indices.shuffle(&mut StdRng::seed_from_u64(seed));

            let mut in_train = vec![false; ordered.len()];
            let train = indices[..train_len]
                .iter()
                .map(|&i| {
                    in_train[i] = true;
                    ordered[i].clone()
                })
                .collect();
            let test = ordered
                .into_iter()
                .zip(in_train)
                .filter_map(|(record, taken)| (!taken).then_some(record))
                .collect();
            Ok(Split { train, test })
        }
    }
}

/// Write `train/train_vm_data.csv` and `test/test_vm_data.csv` under `out_dir`
pub fn write_split(split: &Split, out_dir: impl AsRef<Path>) -> Result<(PathBuf, PathBuf)> {
    let out_dir = out_dir.as_ref();
    let train_path = out_dir.join("train").join("train_vm_data.csv");
    let test_path = out_dir.join("test").join("test_vm_data.csv");

    write_snapshot(&split.train, &train_path)?;
    write_snapshot(&split.test, &test_path)?;
    Ok((train_path, test_path))
}
