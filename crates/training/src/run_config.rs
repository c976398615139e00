use anyhow::Context;
use clap::Parser;
use patch_dataset::{
    AugmentPipeline, DatasetKind, DatasetRoots, LabelMode, PrepareOptions, RunType, SampleConfig,
};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

#[derive(Parser, Debug, Clone, Serialize)]
#[command(
    name = "prepare",
    about = "Prepare a patch captioning run: splits, loaders, output directory"
)]
pub struct RunConfig {
    /// Dataset to prepare (colon-1, colon-2, prostate-1..3, gastric, k19, k16, kidney, liver, bladder, breakhis).
    #[arg(long, default_value_t = DatasetKind::Colon1)]
    pub dataset: DatasetKind,
    /// Run type: prompt, lora, or single_encoder.
    #[arg(long = "type", default_value_t = RunType::Prompt)]
    #[serde(rename = "type")]
    pub run_type: RunType,
    /// Number of epochs.
    #[arg(long, default_value_t = 30)]
    pub epochs: usize,
    /// Batch size.
    #[arg(long, default_value_t = 16)]
    pub bs: usize,
    /// Adam, AdamW, or SGD.
    #[arg(long, default_value = "AdamW")]
    pub optimizer_type: String,
    #[arg(long, default_value = "cosine")]
    pub scheduler_type: String,
    /// Learning rate.
    #[arg(long, default_value_t = 1e-4)]
    pub lr: f64,
    /// Adam betas, comma separated.
    #[arg(long, value_delimiter = ',', default_values_t = [0.9, 0.999])]
    pub betas: Vec<f32>,
    /// SGD momentum.
    #[arg(long, default_value_t = 0.9)]
    pub momentum: f64,
    #[arg(long, default_value = "vit_b_16")]
    pub encoder_type: String,
    #[arg(long, default_value_t = 8)]
    pub encoder_prompt_len: usize,
    /// Encoder layers without prompts; empty means every layer.
    #[arg(long, value_delimiter = ',')]
    pub encoder_skip_layers: Vec<u32>,
    #[arg(long, value_delimiter = ',', default_values_t = [512])]
    pub layers_dim: Vec<usize>,
    #[arg(long, default_value = "gelu")]
    pub proj_activation: String,
    #[arg(long, default_value = "gpt2")]
    pub decoder_type: String,
    #[arg(long, default_value_t = 8)]
    pub decoder_prompt_len: usize,
    #[arg(long, value_delimiter = ',')]
    pub decoder_skip_layers: Vec<u32>,
    #[arg(long, value_delimiter = ',')]
    pub decoder_skip_layers_for_visual: Vec<u32>,
    #[arg(long, default_value_t = 8)]
    pub lora_r: u32,
    #[arg(long, default_value_t = 16)]
    pub lora_alpha: u32,
    #[arg(long, default_value_t = 0.1)]
    pub lora_drop_out: f32,
    #[arg(long, value_delimiter = ',')]
    pub encoder_lora_skip_layers: Vec<u32>,
    #[arg(long, value_delimiter = ',')]
    pub decoder_lora_skip_layers: Vec<u32>,
    /// Free-form run tag; replaced by the full run name once processed.
    #[arg(long, default_value = "run")]
    pub prefix_outdir: String,
    /// Output root; becomes `<out_dir>/<type>/<run name>` once processed.
    #[arg(long, default_value = "runs")]
    pub out_dir: PathBuf,
    /// Directory holding the per-dataset summary CSVs.
    #[arg(long, default_value = "results")]
    pub results_dir: PathBuf,
    /// Square input side.
    #[arg(long, default_value_t = 224)]
    pub encoder_resize: u32,
    /// Per-channel mean on the 0-255 scale.
    #[arg(long, value_delimiter = ',', default_values_t = [123.675, 116.28, 103.53])]
    pub encoder_mean: Vec<f32>,
    /// Per-channel std on the 0-255 scale.
    #[arg(long, value_delimiter = ',', default_values_t = [58.395, 57.12, 57.375])]
    pub encoder_std: Vec<f32>,
    /// Sample loading threads.
    #[arg(long, default_value_t = 4)]
    pub num_workers: usize,
    #[arg(long, default_value_t = 1)]
    pub breakhis_fold: u32,
    /// Gastric class grouping (3, 4, 5, 6, 8, or 10).
    #[arg(long, default_value_t = 4)]
    pub gastric_classes: u32,
    /// Checkpoint evaluated by a test-only run.
    #[arg(long)]
    pub model_pth: Option<String>,
    /// Seed for shuffling, augmentation, and gastric downsampling.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Root holding every dataset in its default layout.
    #[arg(long)]
    pub data_root: Option<PathBuf>,
    /// TOML file overriding individual dataset roots.
    #[arg(long)]
    pub dataset_config: Option<PathBuf>,
    /// Scheduler period; follows `epochs`.
    #[arg(skip)]
    pub scheduler_k: usize,
}

/// Skip-layer list as it appears in run names: `[1, 2, 10]` → `1210`, `[]` → `full`.
pub fn skip_layers_tag(layers: &[u32]) -> String {
    if layers.is_empty() {
        "full".to_string()
    } else {
        layers.iter().map(u32::to_string).collect()
    }
}

/// Last three digits of the current microsecond, used to tell runs apart.
pub fn run_stamp() -> String {
    let micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_micros())
        .unwrap_or_default();
    format!("{:03}", micros % 1000)
}

impl RunConfig {
    /// Run name: the fields that distinguish runs of this type, joined by `-`.
    pub fn outdir_prefix(&self, stamp: &str) -> String {
        let parts: Vec<String> = match self.run_type {
            RunType::Prompt => vec![
                self.dataset.to_string(),
                self.optimizer_type.clone(),
                self.scheduler_type.clone(),
                self.encoder_type.clone(),
                self.encoder_prompt_len.to_string(),
                skip_layers_tag(&self.encoder_skip_layers),
                self.decoder_type.clone(),
                self.decoder_prompt_len.to_string(),
                skip_layers_tag(&self.decoder_skip_layers),
                skip_layers_tag(&self.decoder_skip_layers_for_visual),
                self.prefix_outdir.clone(),
                stamp.to_string(),
            ],
            RunType::SingleEncoder => vec![
                self.dataset.to_string(),
                self.optimizer_type.clone(),
                self.scheduler_type.clone(),
                self.encoder_type.clone(),
                self.prefix_outdir.clone(),
                stamp.to_string(),
            ],
            RunType::Lora => vec![
                self.dataset.to_string(),
                self.optimizer_type.clone(),
                self.scheduler_type.clone(),
                self.lora_r.to_string(),
                self.lora_alpha.to_string(),
                self.encoder_type.clone(),
                skip_layers_tag(&self.encoder_lora_skip_layers),
                self.decoder_type.clone(),
                skip_layers_tag(&self.decoder_lora_skip_layers),
                skip_layers_tag(&self.decoder_skip_layers_for_visual),
                self.prefix_outdir.clone(),
                stamp.to_string(),
            ],
        };
        parts.join("-")
    }

    pub fn label_mode(&self) -> LabelMode {
        self.run_type.label_mode()
    }

    pub fn prepare_options(&self) -> PrepareOptions {
        PrepareOptions {
            gastric_classes: self.gastric_classes,
            downsample_seed: self.seed,
            breakhis_fold: self.breakhis_fold,
        }
    }

    pub fn sample_config(&self) -> anyhow::Result<SampleConfig> {
        let mean = <[f32; 3]>::try_from(self.encoder_mean.as_slice()).map_err(|_| {
            anyhow::anyhow!(
                "--encoder-mean takes 3 values, got {}",
                self.encoder_mean.len()
            )
        })?;
        let std = <[f32; 3]>::try_from(self.encoder_std.as_slice()).map_err(|_| {
            anyhow::anyhow!("--encoder-std takes 3 values, got {}", self.encoder_std.len())
        })?;
        if std.iter().any(|s| *s == 0.0) {
            anyhow::bail!("--encoder-std must be non-zero");
        }
        Ok(SampleConfig {
            dataset: self.dataset,
            run_type: self.run_type,
            resize: self.encoder_resize,
            mean,
            std,
            seed: self.seed,
            augment: AugmentPipeline::builder().seed(self.seed).build(),
        })
    }

    /// Explicit config file, then `--data-root`, then the default lookup.
    pub fn dataset_roots(&self) -> anyhow::Result<DatasetRoots> {
        if let Some(path) = &self.dataset_config {
            return DatasetRoots::from_path(path)
                .with_context(|| format!("failed to load dataset config {}", path.display()));
        }
        if let Some(root) = &self.data_root {
            return Ok(DatasetRoots::under(root.clone()));
        }
        Ok(DatasetRoots::load()?)
    }
}

/// Name the run, create `<out_dir>/<type>/<name>`, and write `<name>.json` there.
pub fn process_run_config(mut cfg: RunConfig, stamp: &str) -> anyhow::Result<RunConfig> {
    cfg.scheduler_k = cfg.epochs;
    cfg.prefix_outdir = cfg.outdir_prefix(stamp);
    cfg.out_dir = cfg
        .out_dir
        .join(cfg.run_type.as_str())
        .join(&cfg.prefix_outdir);
    fs::create_dir_all(&cfg.out_dir)
        .with_context(|| format!("failed to create {}", cfg.out_dir.display()))?;

    let path = cfg.out_dir.join(format!("{}.json", cfg.prefix_outdir));
    let json = serde_json::to_string_pretty(&cfg)?;
    fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
    info!(run = %cfg.prefix_outdir, config = %path.display(), "saved run config");
    Ok(cfg)
}
