//! Run bookkeeping: per-dataset summary CSV rows and per-epoch prediction dumps.

use crate::run_config::RunConfig;
use anyhow::Context;
use patch_dataset::{Label, RunType};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

/// Bracketed list rendering, e.g. `[1, 2]`.
fn list_repr<T: ToString>(items: &[T]) -> String {
    let inner: Vec<String> = items.iter().map(ToString::to_string).collect();
    format!("[{}]", inner.join(", "))
}

/// Hyper-parameters recorded for a run, in column order.
pub fn config_columns(cfg: &RunConfig) -> Vec<String> {
    let mut cols = vec![
        cfg.epochs.to_string(),
        cfg.bs.to_string(),
        cfg.optimizer_type.clone(),
        cfg.scheduler_type.clone(),
        cfg.lr.to_string(),
        cfg.encoder_type.clone(),
    ];
    match cfg.run_type {
        RunType::Lora => cols.extend([
            cfg.lora_r.to_string(),
            cfg.lora_alpha.to_string(),
            cfg.lora_drop_out.to_string(),
            list_repr(&cfg.layers_dim),
            cfg.proj_activation.clone(),
            cfg.decoder_type.clone(),
            list_repr(&cfg.encoder_lora_skip_layers),
            list_repr(&cfg.decoder_lora_skip_layers),
            list_repr(&cfg.decoder_skip_layers_for_visual),
        ]),
        RunType::Prompt | RunType::SingleEncoder => cols.extend([
            cfg.encoder_prompt_len.to_string(),
            list_repr(&cfg.encoder_skip_layers),
            list_repr(&cfg.layers_dim),
            cfg.proj_activation.clone(),
            cfg.decoder_type.clone(),
            cfg.decoder_prompt_len.to_string(),
            list_repr(&cfg.decoder_skip_layers),
            list_repr(&cfg.decoder_skip_layers_for_visual),
        ]),
    }
    cols
}

/// Append one row to `<results_dir>/<dataset>-<type>.csv`: the run's
/// hyper-parameters, the dataset's validation metrics, then the best epoch
/// (or the evaluated checkpoint when there is none).
pub fn save_config_and_metric(
    cfg: &RunConfig,
    metrics: &BTreeMap<String, f64>,
    best_epoch: Option<usize>,
) -> anyhow::Result<PathBuf> {
    let mut row = config_columns(cfg);
    for name in cfg.dataset.metric_family().metric_names() {
        let value = metrics
            .get(*name)
            .with_context(|| format!("metric {name} missing for {}", cfg.dataset))?;
        row.push(value.to_string());
    }
    match (best_epoch, &cfg.model_pth) {
        (Some(epoch), _) => row.push(epoch.to_string()),
        (None, Some(pth)) => row.push(pth.clone()),
        (None, None) => anyhow::bail!("neither a best epoch nor --model-pth to record"),
    }

    fs::create_dir_all(&cfg.results_dir)
        .with_context(|| format!("failed to create {}", cfg.results_dir.display()))?;
    let path = cfg
        .results_dir
        .join(format!("{}-{}.csv", cfg.dataset, cfg.run_type));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(file);
    writer.write_record(&row)?;
    writer.flush()?;
    info!(path = %path.display(), run = %cfg.prefix_outdir, "appended result row");
    Ok(path)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionPair {
    pub gt: Label,
    pub pred: Label,
}

/// What one epoch produced.
#[derive(Debug, Clone, Default)]
pub struct EpochLog {
    pub train_loss: f64,
    pub lr: f64,
    pub val_metrics: BTreeMap<String, f64>,
    pub ground_truth: Vec<Label>,
    pub predictions: Vec<Label>,
}

impl EpochLog {
    /// Split predictions into (wrong, correct) pairs.
    pub fn partition(&self) -> anyhow::Result<(Vec<PredictionPair>, Vec<PredictionPair>)> {
        if self.ground_truth.len() != self.predictions.len() {
            anyhow::bail!(
                "{} ground-truth labels but {} predictions",
                self.ground_truth.len(),
                self.predictions.len()
            );
        }
        let (correct, wrong): (Vec<_>, Vec<_>) = self
            .ground_truth
            .iter()
            .zip(&self.predictions)
            .map(|(gt, pred)| PredictionPair {
                gt: gt.clone(),
                pred: pred.clone(),
            })
            .partition(|p| p.gt == p.pred);
        Ok((wrong, correct))
    }
}

/// Write `wrongs_<epoch>.json` and `true_<epoch>.json` under the run directory
/// and append the epoch's scalars to `metrics.jsonl`.
pub fn save_info(cfg: &RunConfig, log: &EpochLog, epoch: usize) -> anyhow::Result<()> {
    let (wrong, correct) = log.partition()?;
    fs::create_dir_all(&cfg.out_dir)
        .with_context(|| format!("failed to create {}", cfg.out_dir.display()))?;
    for (name, pairs) in [("wrongs", &wrong), ("true", &correct)] {
        let path = cfg.out_dir.join(format!("{name}_{epoch}.json"));
        fs::write(&path, serde_json::to_string_pretty(pairs)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    let mut record = serde_json::Map::new();
    record.insert("epoch".into(), epoch.into());
    record.insert("train_loss".into(), log.train_loss.into());
    record.insert("lr".into(), log.lr.into());
    for (name, value) in &log.val_metrics {
        record.insert(name.clone(), (*value).into());
    }
    let path = cfg.out_dir.join("metrics.jsonl");
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    writeln!(file, "{}", serde_json::Value::Object(record))?;

    info!(
        epoch,
        train_loss = log.train_loss,
        lr = log.lr,
        wrong = wrong.len(),
        correct = correct.len(),
        "saved epoch info"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn lists_render_bracketed() {
        assert_eq!(list_repr::<u32>(&[]), "[]");
        assert_eq!(list_repr(&[1, 2]), "[1, 2]");
    }

    #[test]
    fn lora_columns_differ_from_prompt_columns() {
        let prompt = RunConfig::parse_from(["prepare"]);
        let lora = RunConfig::parse_from(["prepare", "--type", "lora", "--lora-r", "4"]);
        assert_eq!(config_columns(&prompt).len(), 14);
        assert_eq!(config_columns(&lora).len(), 15);
        assert_eq!(config_columns(&lora)[6], "4");
    }

    #[test]
    fn mismatched_prediction_count_is_an_error() {
        let log = EpochLog {
            ground_truth: vec![Label::Class(0)],
            ..EpochLog::default()
        };
        assert!(log.partition().is_err());
    }
}
