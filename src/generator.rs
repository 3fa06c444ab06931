//! Labeled pair generation over an in-memory item corpus.
//!
//! Both strategies share one execution model: the candidate losses are split
//! into at most `FanOutConfig::workers` contiguous partitions, each scanned by a
//! scoped worker thread. Workers accumulate pairs locally and append them to
//! the shared result under a single lock once per batch. Cancellation is
//! checked before each batch. The order of the merged output is only defined
//! within one worker batch.

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{debug, warn};

use crate::config::FanOutConfig;
use crate::constants::dataset::DEFAULT_SEED;
use crate::constants::generator::{DEFAULT_STALE_DAYS, DESCRIPTION_LOG_CHARS, PROGRESS_LOG_INTERVAL};
use crate::data::{FeatureRecord, IndexedItem};
use crate::errors::MatchError;
use crate::hash::stable_hash_str;
use crate::mapper::FeatureMapper;

/// Cooperative cancellation flag shared between a caller and running workers.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// A token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; workers stop before their next batch.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// `true` once any clone called [`cancel`](Self::cancel).
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// A strategy that turns a raw item corpus into labeled feature records.
pub trait PairGenerator {
    /// Build labeled records from `items`. Output order across workers is unspecified.
    fn generate(&self, items: &[IndexedItem]) -> Result<Vec<FeatureRecord>, MatchError>;
}

/// Positive examples: each loss paired with the finding its matched id refers to.
#[derive(Clone, Debug)]
pub struct PositivePairGenerator {
    mapper: FeatureMapper,
    fan_out: FanOutConfig,
    cancel: CancellationToken,
}

impl PositivePairGenerator {
    /// Generator with default fan-out and no external cancellation.
    pub fn new(mapper: FeatureMapper) -> Self {
        Self {
            mapper,
            fan_out: FanOutConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Worker count and merge batch size.
    pub fn with_fan_out(mut self, fan_out: FanOutConfig) -> Self {
        self.fan_out = fan_out;
        self
    }

    /// Stop early once `cancel` is triggered.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

impl PairGenerator for PositivePairGenerator {
    /// When several findings share the matched id, the first in corpus order wins.
    fn generate(&self, items: &[IndexedItem]) -> Result<Vec<FeatureRecord>, MatchError> {
        let mut findings: HashMap<&str, Vec<&IndexedItem>> = HashMap::new();
        for finding in items.iter().filter(|item| item.is_finding()) {
            findings.entry(finding.id.as_str()).or_default().push(finding);
        }
        let losses: Vec<&IndexedItem> = items
            .iter()
            .filter(|item| item.is_loss() && item.matched_record_id.is_some())
            .collect();
        debug!(
            findings = findings.len(),
            matched_losses = losses.len(),
            "generating positive pairs"
        );

        fan_out(&losses, self.fan_out, &self.cancel, |loss, pairs| {
            let Some(matched_id) = loss.matched_record_id.as_deref() else {
                return;
            };
            let Some(candidates) = findings.get(matched_id) else {
                return;
            };
            if candidates.len() > 1 {
                warn!(
                    matched_record_id = matched_id,
                    description = %truncated_description(loss),
                    candidates = candidates.len(),
                    "finding found multiple times; using the first"
                );
            }
            pairs.push(self.mapper.map_match(loss, candidates[0]));
        })
    }
}

/// Negative examples: stale unmatched losses paired with a random finding.
///
/// The random finding is not checked against the corpus's real matches, so a
/// small share of these "non-matches" may in fact be matches.
#[derive(Clone, Debug)]
pub struct NegativePairGenerator {
    mapper: FeatureMapper,
    stale_days: i64,
    seed: u64,
    reference_time: Option<DateTime<Utc>>,
    fan_out: FanOutConfig,
    cancel: CancellationToken,
}

impl NegativePairGenerator {
    /// Generator with the default seed and staleness threshold.
    pub fn new(mapper: FeatureMapper) -> Self {
        Self {
            mapper,
            stale_days: DEFAULT_STALE_DAYS,
            seed: DEFAULT_SEED,
            reference_time: None,
            fan_out: FanOutConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Losses must be strictly more than `days` whole days old.
    pub fn with_stale_days(mut self, days: i64) -> Self {
        self.stale_days = days;
        self
    }

    /// Seed combined with each loss id to pick its finding.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Fix "now" for the staleness check (defaults to the wall clock at generation time).
    pub fn with_reference_time(mut self, now: DateTime<Utc>) -> Self {
        self.reference_time = Some(now);
        self
    }

    /// Worker count and merge batch size.
    pub fn with_fan_out(mut self, fan_out: FanOutConfig) -> Self {
        self.fan_out = fan_out;
        self
    }

    /// Stop early once `cancel` is triggered.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn is_stale_unmatched(&self, item: &IndexedItem, now: DateTime<Utc>) -> bool {
        item.is_loss()
            && item.matched_record_id.is_none()
            && (now - item.date_of_incident).num_days() > self.stale_days
    }
}

impl PairGenerator for NegativePairGenerator {
    /// Each loss draws its finding from an RNG seeded by `(seed, loss id)`, so
    /// output does not depend on worker count.
    fn generate(&self, items: &[IndexedItem]) -> Result<Vec<FeatureRecord>, MatchError> {
        let findings: Vec<&IndexedItem> = items.iter().filter(|item| item.is_finding()).collect();
        if findings.is_empty() {
            warn!("corpus has no findings; no negative pairs generated");
            return Ok(Vec::new());
        }
        let now = self.reference_time.unwrap_or_else(Utc::now);
        let losses: Vec<&IndexedItem> = items
            .iter()
            .filter(|item| self.is_stale_unmatched(item, now))
            .collect();
        debug!(
            findings = findings.len(),
            stale_losses = losses.len(),
            stale_days = self.stale_days,
            "generating negative pairs"
        );

        fan_out(&losses, self.fan_out, &self.cancel, |loss, pairs| {
            let mut rng = StdRng::seed_from_u64(stable_hash_str(self.seed, &loss.id));
            if let Some(finding) = findings.choose(&mut rng) {
                pairs.push(self.mapper.map_non_match(loss, finding));
            }
        })
    }
}

fn truncated_description(item: &IndexedItem) -> String {
    item.description
        .as_deref()
        .unwrap_or_default()
        .chars()
        .take(DESCRIPTION_LOG_CHARS)
        .collect()
}

/// Scan `inputs` on bounded scoped workers, merging per-batch local results.
fn fan_out<T, F>(
    inputs: &[T],
    config: FanOutConfig,
    cancel: &CancellationToken,
    step: F,
) -> Result<Vec<FeatureRecord>, MatchError>
where
    T: Sync,
    F: Fn(&T, &mut Vec<FeatureRecord>) + Sync,
{
    let config = config.validated()?;
    if cancel.is_cancelled() {
        return Err(MatchError::Cancelled);
    }
    if inputs.is_empty() {
        return Ok(Vec::new());
    }
    let workers = config.workers.min(inputs.len());
    let partition_len = inputs.len().div_ceil(workers);
    let results = Mutex::new(Vec::with_capacity(inputs.len()));
    let step = &step;
    let shared = &results;

    thread::scope(|scope| {
        let handles: Vec<_> = inputs
            .chunks(partition_len)
            .map(|partition| {
                scope.spawn(move || -> Result<(), MatchError> {
                    let mut local = Vec::with_capacity(config.batch_size.min(partition.len()));
                    for batch in partition.chunks(config.batch_size) {
                        if cancel.is_cancelled() {
                            return Err(MatchError::Cancelled);
                        }
                        for input in batch {
                            step(input, &mut local);
                        }
                        merge_batch(shared, &mut local)?;
                    }
                    Ok(())
                })
            })
            .collect();

        let mut first_error = None;
        for handle in handles {
            let outcome = handle
                .join()
                .unwrap_or_else(|payload| Err(MatchError::WorkerPanicked(panic_message(&*payload))));
            if let Err(err) = outcome {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    })?;

    results
        .into_inner()
        .map_err(|_| MatchError::WorkerPanicked("result lock poisoned".into()))
}

fn merge_batch(
    shared: &Mutex<Vec<FeatureRecord>>,
    local: &mut Vec<FeatureRecord>,
) -> Result<(), MatchError> {
    if local.is_empty() {
        return Ok(());
    }
    let mut guard = shared
        .lock()
        .map_err(|_| MatchError::WorkerPanicked("result lock poisoned".into()))?;
    let before = guard.len();
    guard.append(local);
    let after = guard.len();
    drop(guard);
    if after / PROGRESS_LOG_INTERVAL > before / PROGRESS_LOG_INTERVAL {
        debug!(pairs = after, "pairs merged");
    }
    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
