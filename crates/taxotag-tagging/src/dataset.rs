//! Seeded train/validation/test splitting of JSONL corpora.

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use taxotag_core::defaults;
use taxotag_core::{Error, Result};

pub const TRAIN_FILE: &str = "train.jsonl";
pub const VALIDATION_FILE: &str = "validation.jsonl";
pub const TEST_FILE: &str = "test.jsonl";

/// Parameters of one split run.
#[derive(Debug, Clone)]
pub struct SplitConfig {
    /// Records kept after shuffling; 0 keeps everything.
    pub size: usize,
    pub seed: u64,
    pub train_frac: f64,
    pub val_frac: f64,
    pub out_dir: PathBuf,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            size: defaults::SPLIT_SIZE,
            seed: defaults::SPLIT_SEED,
            train_frac: defaults::SPLIT_TRAIN_FRAC,
            val_frac: defaults::SPLIT_VAL_FRAC,
            out_dir: PathBuf::from(defaults::SPLIT_OUT_DIR),
        }
    }
}

impl SplitConfig {
    fn validate(&self) -> Result<()> {
        let in_unit = |f: f64| (0.0..=1.0).contains(&f);
        if !in_unit(self.train_frac) || !in_unit(self.val_frac) {
            return Err(Error::InvalidInput(format!(
                "split fractions must be within [0, 1], got train={} val={}",
                self.train_frac, self.val_frac
            )));
        }
        if self.train_frac + self.val_frac > 1.0 {
            return Err(Error::InvalidInput(format!(
                "train_frac + val_frac must not exceed 1, got {}",
                self.train_frac + self.val_frac
            )));
        }
        Ok(())
    }
}

/// Sizes and locations of the written splits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitSummary {
    pub train: usize,
    pub validation: usize,
    pub test: usize,
    pub train_path: PathBuf,
    pub validation_path: PathBuf,
    pub test_path: PathBuf,
}

/// Read a JSONL file into values, skipping blank lines.
pub fn read_jsonl(path: impl AsRef<Path>) -> Result<Vec<Value>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;
    let mut records = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value = serde_json::from_str(&line).map_err(|e| {
            Error::Serialization(format!("{}:{}: {}", path.display(), idx + 1, e))
        })?;
        records.push(value);
    }
    Ok(records)
}

/// Write values as JSON lines, replacing any existing file.
pub fn write_jsonl<T: Serialize>(path: impl AsRef<Path>, records: &[T]) -> Result<()> {
    let mut out = BufWriter::new(std::fs::File::create(path)?);
    for record in records {
        serde_json::to_writer(&mut out, record)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

/// Shuffle, truncate, and partition `records` into `(train, validation, test)`.
///
/// `n_train = floor(train_frac * n)`, `n_val = floor(val_frac * n)`, and the
/// test split takes the remainder.
pub fn partition<T>(mut records: Vec<T>, config: &SplitConfig) -> Result<(Vec<T>, Vec<T>, Vec<T>)> {
    config.validate()?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    records.shuffle(&mut rng);
    if config.size > 0 && config.size < records.len() {
        records.truncate(config.size);
    }

    let n = records.len();
    let n_train = (config.train_frac * n as f64).floor() as usize;
    let n_val = ((config.val_frac * n as f64).floor() as usize).min(n - n_train);

    let test = records.split_off(n_train + n_val);
    let validation = records.split_off(n_train);
    Ok((records, validation, test))
}

/// Split the JSONL corpus at `input` into three files under `config.out_dir`.
pub fn create_splits(input: impl AsRef<Path>, config: &SplitConfig) -> Result<SplitSummary> {
    let input = input.as_ref();
    let records = read_jsonl(input)?;
    let corpus = records.len();
    let (train, validation, test) = partition(records, config)?;

    std::fs::create_dir_all(&config.out_dir)?;
    let summary = SplitSummary {
        train: train.len(),
        validation: validation.len(),
        test: test.len(),
        train_path: config.out_dir.join(TRAIN_FILE),
        validation_path: config.out_dir.join(VALIDATION_FILE),
        test_path: config.out_dir.join(TEST_FILE),
    };
    write_jsonl(&summary.train_path, &train)?;
    write_jsonl(&summary.validation_path, &validation)?;
    write_jsonl(&summary.test_path, &test)?;

    info!(
        input = %input.display(),
        corpus,
        train = summary.train,
        validation = summary.validation,
        test = summary.test,
        seed = config.seed,
        "Dataset split written"
    );
    Ok(summary)
}
