//! Train/test split of generated pairs plus JSON persistence of the split.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

use crate::config::MatchConfig;
use crate::constants::dataset::{TEST_JSON, TRAINING_JSON};
use crate::corpus::Corpus;
use crate::data::{AttributeMetadata, FeatureRecord};
use crate::errors::MatchError;
use crate::generator::{CancellationToken, NegativePairGenerator, PairGenerator, PositivePairGenerator};
use crate::mapper::FeatureMapper;
use crate::vector::{ActiveAttributes, VectorAssembler, active_attributes_from_metadata};

/// Labeled pairs split into disjoint training and test sets.
#[derive(Clone, Debug, Default)]
pub struct LearningDataset {
    /// Corpus attributes that occur in at least one pair, in corpus order.
    pub active_metadata: ActiveAttributes,
    /// Pairs used to fit the model.
    pub training: Vec<FeatureRecord>,
    /// Held-out pairs; no record appears in both sets.
    pub test: Vec<FeatureRecord>,
}

impl LearningDataset {
    /// Scan `corpus`, generate positive and negative pairs, then split them.
    pub fn generate(
        corpus: &Corpus,
        config: &MatchConfig,
        cancel: &CancellationToken,
    ) -> Result<Self, MatchError> {
        let config = config.clone().validated()?;
        let mapper = FeatureMapper::from(corpus.mapper_settings());
        let matches = PositivePairGenerator::new(mapper.clone())
            .with_fan_out(config.fan_out)
            .with_cancellation(cancel.clone())
            .generate(&corpus.items)?;
        let unmatched = NegativePairGenerator::new(mapper)
            .with_stale_days(config.stale_days)
            .with_seed(config.seed)
            .with_fan_out(config.fan_out)
            .with_cancellation(cancel.clone())
            .generate(&corpus.items)?;
        info!(
            matches = matches.len(),
            unmatched = unmatched.len(),
            "generated pairs"
        );
        Self::from_pairs(matches, unmatched, &corpus.metadata, config.train_fraction)
    }

    /// Split positives and negatives into a balanced training set and a test set.
    ///
    /// With `n = floor(|matches| * train_fraction)`, training receives the
    /// first `n` matches and the first `n` non-matches. Test receives the
    /// remaining matches and at most as many of the following non-matches.
    pub fn from_pairs(
        matches: Vec<FeatureRecord>,
        unmatched: Vec<FeatureRecord>,
        metadata: &[AttributeMetadata],
        train_fraction: f32,
    ) -> Result<Self, MatchError> {
        if !(train_fraction > 0.0 && train_fraction < 1.0) {
            return Err(MatchError::Configuration(format!(
                "train fraction {train_fraction} must lie strictly between 0 and 1"
            )));
        }
        let split = (matches.len() as f64 * f64::from(train_fraction)).floor() as usize;
        let test_matches = matches.len() - split;
        let train_unmatched = split.min(unmatched.len());
        let test_unmatched_end = (train_unmatched + test_matches).min(unmatched.len());

        let mut matches = matches.into_iter();
        let mut unmatched = unmatched.into_iter();
        let mut training: Vec<FeatureRecord> = matches.by_ref().take(split).collect();
        training.extend(unmatched.by_ref().take(train_unmatched));
        let mut test: Vec<FeatureRecord> = matches.collect();
        test.extend(unmatched.take(test_unmatched_end - train_unmatched));

        debug!(
            training = training.len(),
            test = test.len(),
            split,
            "split pairs into training and test sets"
        );
        Ok(Self::from_parts(training, test, metadata))
    }

    /// Rebuild a dataset from already split pairs (e.g. loaded from disk).
    pub fn from_parts(
        training: Vec<FeatureRecord>,
        test: Vec<FeatureRecord>,
        metadata: &[AttributeMetadata],
    ) -> Self {
        let used: HashSet<&str> = training
            .iter()
            .chain(test.iter())
            .flat_map(FeatureRecord::attribute_ids)
            .map(String::as_str)
            .collect();
        let active_metadata = active_attributes_from_metadata(
            metadata
                .iter()
                .filter(|entry| entry.id.as_deref().is_some_and(|id| used.contains(id))),
        );
        Self {
            active_metadata,
            training,
            test,
        }
    }

    /// Assembler whose layout covers every active attribute of this dataset.
    pub fn vector_assembler(&self) -> VectorAssembler {
        VectorAssembler::new(self.active_metadata.clone())
    }

    /// Persist both sets as `training.json` / `test.json` under `dir`.
    pub fn write_json(&self, dir: &Path) -> Result<(), MatchError> {
        fs::create_dir_all(dir)?;
        write_pairs_json(&dir.join(TRAINING_JSON), &self.training)?;
        write_pairs_json(&dir.join(TEST_JSON), &self.test)?;
        Ok(())
    }

    /// Load a split previously written by `write_json`.
    pub fn read_json(dir: &Path, metadata: &[AttributeMetadata]) -> Result<Self, MatchError> {
        let training = read_pairs_json(&dir.join(TRAINING_JSON))?;
        let test = read_pairs_json(&dir.join(TEST_JSON))?;
        Ok(Self::from_parts(training, test, metadata))
    }
}

/// Write `pairs` as a JSON array.
pub fn write_pairs_json(path: &Path, pairs: &[FeatureRecord]) -> Result<(), MatchError> {
    write_json(path, pairs)?;
    info!(path = %path.display(), pairs = pairs.len(), "wrote pairs");
    Ok(())
}

/// Read a JSON array of pairs written by `write_pairs_json`.
pub fn read_pairs_json(path: &Path) -> Result<Vec<FeatureRecord>, MatchError> {
    let pairs: Vec<FeatureRecord> = read_json(path)?;
    debug!(path = %path.display(), pairs = pairs.len(), "loaded pairs");
    Ok(pairs)
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, MatchError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), MatchError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}
