//! Image sample provider: decode, resize, augment, normalize, caption.

use crate::aug::AugmentPipeline;
use crate::types::{DatasetKind, DatasetResult, Label, PatchDatasetError, RunType, Sample};
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Prompt slot filled in when the run type trains on bare class ids.
pub const NO_HARD_PROMPT: &str = "no_hard_prompt";

#[derive(Debug, Clone)]
pub struct SampleConfig {
    pub dataset: DatasetKind,
    pub run_type: RunType,
    /// Square side every patch is resized to.
    pub resize: u32,
    /// Per-channel mean on the 0-255 scale.
    pub mean: [f32; 3],
    /// Per-channel std on the 0-255 scale.
    pub std: [f32; 3],
    /// Fixes augmentation per sample index when set.
    pub seed: Option<u64>,
    pub augment: AugmentPipeline,
}

impl SampleConfig {
    pub fn new(dataset: DatasetKind, run_type: RunType) -> Self {
        Self {
            dataset,
            run_type,
            resize: 224,
            mean: [0.0; 3],
            std: [1.0; 3],
            seed: None,
            augment: AugmentPipeline::default(),
        }
    }
}

/// What the training loop consumes for one patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchItem {
    pub path: PathBuf,
    /// `3 × size × size`, channel-major, normalized.
    pub image_chw: Vec<f32>,
    pub size: u32,
    pub hard_prompt: String,
    /// Full caption, or the raw label for encoder-only runs.
    pub target: Label,
}

/// Indexable view over one split.
#[derive(Debug, Clone)]
pub struct PatchDataset {
    samples: Vec<Sample>,
    cfg: SampleConfig,
    hard_prompt: &'static str,
    train: bool,
}

impl PatchDataset {
    pub fn new(samples: Vec<Sample>, cfg: &SampleConfig, train: bool) -> Self {
        let mut cfg = cfg.clone();
        if cfg.augment.seed.is_none() {
            cfg.augment.seed = cfg.seed;
        }
        Self {
            samples,
            hard_prompt: cfg.dataset.hard_prompt(),
            cfg,
            train,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_train(&self) -> bool {
        self.train
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn config(&self) -> &SampleConfig {
        &self.cfg
    }

    pub fn get(&self, index: usize) -> DatasetResult<PatchItem> {
        let sample = self
            .samples
            .get(index)
            .ok_or(PatchDatasetError::IndexOutOfRange {
                index,
                len: self.samples.len(),
            })?;
        let img = image::open(&sample.path)
            .map_err(|e| PatchDatasetError::Image {
                path: sample.path.clone(),
                source: e,
            })?
            .to_rgb8();
        let size = self.cfg.resize;
        let mut img = image::imageops::resize(&img, size, size, FilterType::Triangle);
        if self.train {
            img = self.cfg.augment.apply(img, index as u64);
        }
        let image_chw = normalize_chw(&img, self.cfg.mean, self.cfg.std);

        let (hard_prompt, target) = match self.cfg.run_type {
            RunType::SingleEncoder => (NO_HARD_PROMPT.to_string(), sample.label.clone()),
            _ => (
                self.hard_prompt.to_string(),
                Label::Caption(self.cfg.dataset.caption_for(&sample.label)),
            ),
        };
        Ok(PatchItem {
            path: sample.path.clone(),
            image_chw,
            size,
            hard_prompt,
            target,
        })
    }
}

/// HWC bytes → CHW floats with `(v - mean[c]) / std[c]` on the 0-255 scale.
pub fn normalize_chw(img: &image::RgbImage, mean: [f32; 3], std: [f32; 3]) -> Vec<f32> {
    let (width, height) = img.dimensions();
    let plane = (width * height) as usize;
    let mut image_chw = vec![0.0f32; plane * 3];
    for (x, y, pixel) in img.enumerate_pixels() {
        let base = (y * width + x) as usize;
        for c in 0..3 {
            image_chw[c * plane + base] = (pixel[c] as f32 - mean[c]) / std[c];
        }
    }
    image_chw
}
