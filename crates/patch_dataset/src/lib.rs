//! Histopathology patch datasets for caption-conditioned training.
//!
//! This crate provides utilities for:
//! - Enumerating patch files for a fixed set of grading and tissue datasets
//! - Mapping path tokens to captions or class ids
//! - Assembling train/valid/test splits
//! - Building hard prompts and captions
//! - Loading, augmenting, and batching image samples

// Module declarations
pub mod aug;
pub mod batch;
pub mod config;
pub mod enumerate;
pub mod labels;
pub mod prompt;
pub mod sample;
pub mod splits;
pub mod types;

// Re-export public API
pub use aug::{AugmentPipeline, AugmentPipelineBuilder};
pub use batch::{build_loaders, BatchConfig, BatchIter, PatchBatch};
pub use config::{DatasetRoots, GastricCohort};
pub use enumerate::{glob_files, glob_many};
pub use prompt::{
    caption_list, combine_hard_prompt_with_label, get_caption, get_hard_prompt, CaptionList,
};
pub use sample::{normalize_chw, PatchDataset, PatchItem, SampleConfig, NO_HARD_PROMPT};
pub use splits::{prepare_dataset, PrepareOptions};
pub use types::*;
