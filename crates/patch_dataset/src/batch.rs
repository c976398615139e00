//! Batch iteration for training and validation.

use crate::sample::{PatchDataset, PatchItem, SampleConfig};
use crate::types::{DatasetResult, Label, Sample};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub(crate) const DEFAULT_LOG_EVERY_SAMPLES: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    pub batch_size: usize,
    /// Reshuffle the sample order at the start of every epoch.
    pub shuffle: bool,
    /// Drop the last partial batch.
    pub drop_last: bool,
    /// Seed for reproducible shuffling.
    pub seed: Option<u64>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            shuffle: true,
            drop_last: false,
            seed: None,
        }
    }
}

/// One collated batch, images flattened row-major as `[N, 3, H, W]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatchBatch {
    pub images: Vec<f32>,
    pub shape: [usize; 4],
    pub paths: Vec<PathBuf>,
    pub prompts: Vec<String>,
    pub targets: Vec<Label>,
}

impl PatchBatch {
    pub fn len(&self) -> usize {
        self.shape[0]
    }

    pub fn is_empty(&self) -> bool {
        self.shape[0] == 0
    }

    fn collate(items: Vec<PatchItem>) -> Self {
        let size = items.first().map(|i| i.size as usize).unwrap_or_default();
        let mut images = Vec::with_capacity(items.len() * 3 * size * size);
        let mut paths = Vec::with_capacity(items.len());
        let mut prompts = Vec::with_capacity(items.len());
        let mut targets = Vec::with_capacity(items.len());
        let n = items.len();
        for item in items {
            images.extend_from_slice(&item.image_chw);
            paths.push(item.path);
            prompts.push(item.hard_prompt);
            targets.push(item.target);
        }
        Self {
            images,
            shape: [n, 3, size, size],
            paths,
            prompts,
            targets,
        }
    }

    #[cfg(feature = "burn-runtime")]
    pub fn images_tensor<B: burn::tensor::backend::Backend>(
        &self,
        device: &B::Device,
    ) -> burn::tensor::Tensor<B, 4> {
        burn::tensor::Tensor::<B, 1>::from_floats(self.images.as_slice(), device)
            .reshape(self.shape)
    }
}

pub struct BatchIter {
    dataset: PatchDataset,
    order: Vec<usize>,
    cursor: usize,
    cfg: BatchConfig,
    rng: rand::rngs::StdRng,
    epoch: usize,
    processed_samples: usize,
    processed_batches: usize,
    started: Instant,
    total_load_time: Duration,
    last_log: Instant,
    last_logged_samples: usize,
    log_every_samples: Option<usize>,
    trace_path: Option<PathBuf>,
    trace_file: Option<std::fs::File>,
}

impl BatchIter {
    pub fn new(dataset: PatchDataset, cfg: BatchConfig) -> Self {
        let rng = match cfg.seed {
            Some(seed) => rand::rngs::StdRng::seed_from_u64(seed),
            None => rand::rngs::StdRng::from_rng(&mut rand::rng()),
        };
        let log_every_samples = match std::env::var("PATCH_DATASET_LOG_EVERY") {
            Ok(val) => {
                if val.eq_ignore_ascii_case("off") || val.trim() == "0" {
                    None
                } else {
                    val.parse::<usize>().ok().filter(|v| *v > 0)
                }
            }
            Err(_) => Some(DEFAULT_LOG_EVERY_SAMPLES),
        };
        let trace_path = std::env::var("PATCH_DATASET_TRACE")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);
        let now = Instant::now();
        let mut iter = Self {
            order: (0..dataset.len()).collect(),
            dataset,
            cursor: 0,
            cfg,
            rng,
            epoch: 0,
            processed_samples: 0,
            processed_batches: 0,
            started: now,
            total_load_time: Duration::ZERO,
            last_log: now,
            last_logged_samples: 0,
            log_every_samples,
            trace_path,
            trace_file: None,
        };
        if iter.cfg.shuffle {
            iter.order.shuffle(&mut iter.rng);
        }
        iter
    }

    pub fn dataset(&self) -> &PatchDataset {
        &self.dataset
    }

    pub fn epoch(&self) -> usize {
        self.epoch
    }

    /// Batches one epoch yields.
    pub fn num_batches(&self) -> usize {
        let n = self.order.len();
        let bs = self.cfg.batch_size.max(1);
        if self.cfg.drop_last {
            n / bs
        } else {
            n.div_ceil(bs)
        }
    }

    /// Rewind for the next epoch, reshuffling when configured.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.epoch += 1;
        if self.cfg.shuffle {
            self.order.shuffle(&mut self.rng);
        }
    }

    pub fn next_batch(&mut self) -> DatasetResult<Option<PatchBatch>> {
        let batch_size = self.cfg.batch_size.max(1);
        let remaining = self.order.len().saturating_sub(self.cursor);
        if remaining == 0 || (self.cfg.drop_last && remaining < batch_size) {
            return Ok(None);
        }
        let end = (self.cursor + batch_size).min(self.order.len());
        let slice = &self.order[self.cursor..end];
        self.cursor = end;

        let t_load = Instant::now();
        let dataset = &self.dataset;
        let items = slice
            .par_iter()
            .map(|&i| dataset.get(i))
            .collect::<DatasetResult<Vec<_>>>()?;
        let load_elapsed = t_load.elapsed();

        let batch = PatchBatch::collate(items);
        self.processed_samples += batch.len();
        self.processed_batches += 1;
        self.total_load_time += load_elapsed;
        self.maybe_trace(&batch, load_elapsed);
        self.maybe_log_progress();
        Ok(Some(batch))
    }

    #[cfg(feature = "burn-runtime")]
    pub fn next_burn_batch<B: burn::tensor::backend::Backend>(
        &mut self,
        device: &B::Device,
    ) -> DatasetResult<Option<(burn::tensor::Tensor<B, 4>, PatchBatch)>> {
        Ok(self.next_batch()?.map(|batch| {
            let images = batch.images_tensor::<B>(device);
            (images, batch)
        }))
    }

    fn maybe_log_progress(&mut self) {
        let Some(threshold) = self.log_every_samples else {
            return;
        };
        let processed_since = self
            .processed_samples
            .saturating_sub(self.last_logged_samples);
        let should_log =
            processed_since >= threshold || self.last_log.elapsed() >= Duration::from_secs(30);
        if !should_log {
            return;
        }
        let secs = self.started.elapsed().as_secs_f32().max(0.001);
        let avg_load_ms = if self.processed_batches > 0 {
            (self.total_load_time.as_secs_f64() * 1000.0) / self.processed_batches as f64
        } else {
            0.0
        };
        info!(
            epoch = self.epoch,
            batches = self.processed_batches,
            samples = self.processed_samples,
            elapsed_s = secs,
            rate = self.processed_samples as f32 / secs,
            avg_load_ms,
            "batch progress"
        );
        self.last_logged_samples = self.processed_samples;
        self.last_log = Instant::now();
    }

    fn maybe_trace(&mut self, batch: &PatchBatch, load_elapsed: Duration) {
        let Some(path) = &self.trace_path else {
            return;
        };
        if self.trace_file.is_none() {
            if let Some(parent) = path.parent() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    warn!(path = %parent.display(), "failed to create trace directory: {e}");
                    self.trace_path = None;
                    return;
                }
            }
            match std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
            {
                Ok(f) => self.trace_file = Some(f),
                Err(e) => {
                    warn!(path = %path.display(), "failed to open trace file: {e}");
                    self.trace_path = None;
                    return;
                }
            }
        }
        let Some(file) = self.trace_file.as_mut() else {
            return;
        };
        let record = serde_json::json!({
            "epoch": self.epoch,
            "batch": self.processed_batches,
            "samples": batch.len(),
            "size": batch.shape[2],
            "load_ms": load_elapsed.as_secs_f64() * 1000.0,
            "timestamp_ms": self.started.elapsed().as_millis() as u64
        });
        if let Err(e) = writeln!(file, "{}", record) {
            warn!("failed to write trace record: {e}");
            self.trace_path = None;
            self.trace_file = None;
        }
    }
}

/// Train and validation iterators. Train drops its last partial batch;
/// both shuffle.
pub fn build_loaders(
    train: Vec<Sample>,
    valid: Vec<Sample>,
    cfg: &SampleConfig,
    batch_size: usize,
) -> (BatchIter, BatchIter) {
    let train_iter = BatchIter::new(
        PatchDataset::new(train, cfg, true),
        BatchConfig {
            batch_size,
            shuffle: true,
            drop_last: true,
            seed: cfg.seed,
        },
    );
    let valid_iter = BatchIter::new(
        PatchDataset::new(valid, cfg, false),
        BatchConfig {
            batch_size,
            shuffle: true,
            drop_last: false,
            seed: cfg.seed,
        },
    );
    info!(
        train_batches = train_iter.num_batches(),
        valid_batches = valid_iter.num_batches(),
        batch_size,
        augment = %cfg.augment.describe(),
        "built loaders"
    );
    (train_iter, valid_iter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DatasetKind, RunType};

    fn empty_like(n: usize) -> PatchDataset {
        let samples = (0..n)
            .map(|i| Sample::new(format!("/none/{i}_0.jpg"), Label::Class(0)))
            .collect();
        PatchDataset::new(
            samples,
            &SampleConfig::new(DatasetKind::Colon1, RunType::SingleEncoder),
            false,
        )
    }

    #[test]
    fn batch_counts_follow_drop_last() {
        let cfg = BatchConfig {
            batch_size: 4,
            shuffle: false,
            drop_last: true,
            seed: None,
        };
        assert_eq!(BatchIter::new(empty_like(10), cfg).num_batches(), 2);
        let keep = BatchConfig {
            drop_last: false,
            ..cfg
        };
        assert_eq!(BatchIter::new(empty_like(10), keep).num_batches(), 3);
        assert_eq!(BatchIter::new(empty_like(0), keep).num_batches(), 0);
    }

    #[test]
    fn seeded_shuffle_is_a_reproducible_permutation() {
        let cfg = BatchConfig {
            batch_size: 2,
            shuffle: true,
            drop_last: false,
            seed: Some(11),
        };
        let a = BatchIter::new(empty_like(20), cfg);
        let b = BatchIter::new(empty_like(20), cfg);
        assert_eq!(a.order, b.order);
        let mut sorted = a.order.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn short_tail_is_dropped_without_loading() {
        let cfg = BatchConfig {
            batch_size: 8,
            shuffle: false,
            drop_last: true,
            seed: None,
        };
        let mut iter = BatchIter::new(empty_like(5), cfg);
        assert!(iter.next_batch().expect("no load attempted").is_none());
    }

    #[test]
    fn trace_is_disabled_when_its_directory_cannot_be_made() -> std::io::Result<()> {
        let tmp = tempfile::tempdir()?;
        let blocker = tmp.path().join("not_a_dir");
        std::fs::write(&blocker, b"")?;

        let mut iter = BatchIter::new(empty_like(2), BatchConfig::default());
        iter.trace_path = Some(blocker.join("trace/batches.jsonl"));
        let batch = PatchBatch::collate(Vec::new());
        iter.maybe_trace(&batch, Duration::ZERO);
        assert!(iter.trace_path.is_none());
        assert!(iter.trace_file.is_none());

        // Later batches skip tracing instead of retrying.
        iter.maybe_trace(&batch, Duration::ZERO);
        assert!(iter.trace_file.is_none());
        Ok(())
    }

    #[test]
    fn trace_writes_one_line_per_batch() -> std::io::Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("nested/trace.jsonl");
        let mut iter = BatchIter::new(empty_like(2), BatchConfig::default());
        iter.trace_path = Some(path.clone());
        let batch = PatchBatch::collate(Vec::new());
        iter.maybe_trace(&batch, Duration::ZERO);
        iter.maybe_trace(&batch, Duration::ZERO);
        drop(iter);
        assert_eq!(std::fs::read_to_string(path)?.lines().count(), 2);
        Ok(())
    }
}
