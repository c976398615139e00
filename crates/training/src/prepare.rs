use crate::optim::OptimizerSettings;
use crate::run_config::RunConfig;
use crate::TrainBackend;
use anyhow::Context;
use burn::tensor::backend::Backend;
use patch_dataset::{build_loaders, prepare_dataset, SplitSummary};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

/// What a prepared run looks like before any model is touched.
#[derive(Debug, Clone, Serialize)]
pub struct PrepareReport {
    pub run_name: String,
    pub out_dir: PathBuf,
    pub splits: SplitSummary,
    /// Head size for the dataset.
    pub num_classes: usize,
    pub train_batches: usize,
    pub valid_batches: usize,
    /// `[N, 3, H, W]` of the first training batch, if the train split fills one.
    pub first_batch_shape: Option<[usize; 4]>,
    pub optimizer: String,
    /// Burn optimizer config variant that was built.
    pub optimizer_config: String,
}

/// Size the global sample-loading pool. A pool that already exists is kept.
fn configure_workers(num_workers: usize) {
    if let Err(err) = rayon::ThreadPoolBuilder::new()
        .num_threads(num_workers.max(1))
        .build_global()
    {
        debug!("keeping existing loader pool: {err}");
    }
}

/// Assemble the splits and loaders for an already processed run config,
/// pull one training batch through the burn backend, and write
/// `splits.json` plus `prepare.json` into the run directory.
pub fn run_prepare(cfg: &RunConfig) -> anyhow::Result<PrepareReport> {
    configure_workers(cfg.num_workers);
    let optimizer = OptimizerSettings::from_config(cfg)?;
    let optimizer_config = optimizer.build();
    let sample_cfg = cfg.sample_config()?;
    let roots = cfg.dataset_roots()?;

    let splits = prepare_dataset(
        cfg.dataset,
        &roots,
        cfg.label_mode(),
        &cfg.prepare_options(),
    )
    .with_context(|| format!("failed to prepare {}", cfg.dataset))?;
    let summary = splits.summary();

    let splits_path = cfg.out_dir.join("splits.json");
    fs::write(&splits_path, serde_json::to_string_pretty(&splits)?)
        .with_context(|| format!("failed to write {}", splits_path.display()))?;

    let (mut train, valid) = build_loaders(splits.train, splits.valid, &sample_cfg, cfg.bs);
    let device = <TrainBackend as Backend>::Device::default();
    let first_batch_shape = train
        .next_burn_batch::<TrainBackend>(&device)?
        .map(|(images, _)| images.dims());

    let report = PrepareReport {
        run_name: cfg.prefix_outdir.clone(),
        out_dir: cfg.out_dir.clone(),
        splits: summary,
        num_classes: cfg.dataset.num_classes(),
        train_batches: train.num_batches(),
        valid_batches: valid.num_batches(),
        first_batch_shape,
        optimizer: optimizer.describe(),
        optimizer_config: optimizer_config.name().to_string(),
    };
    let report_path = cfg.out_dir.join("prepare.json");
    fs::write(&report_path, serde_json::to_string_pretty(&report)?)
        .with_context(|| format!("failed to write {}", report_path.display()))?;

    info!(
        dataset = %cfg.dataset,
        run_type = %cfg.run_type,
        train = summary.train,
        valid = summary.valid,
        test = summary.test,
        classes = report.num_classes,
        optimizer = %report.optimizer,
        scheduler = %cfg.scheduler_type,
        scheduler_k = cfg.scheduler_k,
        "run prepared"
    );
    Ok(report)
}
