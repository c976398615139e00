//! Core types, error definitions, and data structures for patch_dataset.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

pub type DatasetResult<T> = Result<T, PatchDatasetError>;

#[derive(Debug, Error)]
pub enum PatchDatasetError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("json parse error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("csv error at {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("toml parse error at {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("bad glob pattern {pattern} under {root}: {source}")]
    Glob {
        root: PathBuf,
        pattern: String,
        #[source]
        source: globwalk::GlobError,
    },
    #[error("image decode error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("unsupported dataset {0}")]
    UnsupportedDataset(String),
    #[error("{dataset}: no label mapping for token {token:?} ({path})")]
    UnmappedLabel {
        dataset: DatasetKind,
        token: String,
        path: PathBuf,
    },
    #[error("sample index {index} out of range ({len} samples)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("{0}")]
    Other(String),
}

/// Every dataset the preparation layer knows how to enumerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DatasetKind {
    #[serde(rename = "colon-1")]
    Colon1,
    #[serde(rename = "colon-2")]
    Colon2,
    #[serde(rename = "prostate-1")]
    Prostate1,
    #[serde(rename = "prostate-2")]
    Prostate2,
    #[serde(rename = "prostate-3")]
    Prostate3,
    #[serde(rename = "gastric")]
    Gastric,
    #[serde(rename = "k19")]
    K19,
    #[serde(rename = "k16")]
    K16,
    #[serde(rename = "kidney")]
    Kidney,
    #[serde(rename = "liver")]
    Liver,
    #[serde(rename = "bladder")]
    Bladder,
    #[serde(rename = "breakhis")]
    Breakhis,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 12] = [
        DatasetKind::Colon1,
        DatasetKind::Colon2,
        DatasetKind::Prostate1,
        DatasetKind::Prostate2,
        DatasetKind::Prostate3,
        DatasetKind::Gastric,
        DatasetKind::K19,
        DatasetKind::K16,
        DatasetKind::Kidney,
        DatasetKind::Liver,
        DatasetKind::Bladder,
        DatasetKind::Breakhis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Colon1 => "colon-1",
            DatasetKind::Colon2 => "colon-2",
            DatasetKind::Prostate1 => "prostate-1",
            DatasetKind::Prostate2 => "prostate-2",
            DatasetKind::Prostate3 => "prostate-3",
            DatasetKind::Gastric => "gastric",
            DatasetKind::K19 => "k19",
            DatasetKind::K16 => "k16",
            DatasetKind::Kidney => "kidney",
            DatasetKind::Liver => "liver",
            DatasetKind::Bladder => "bladder",
            DatasetKind::Breakhis => "breakhis",
        }
    }

    /// Number of output classes a classifier head is sized for.
    pub fn num_classes(&self) -> usize {
        match self {
            DatasetKind::Kidney => 5,
            DatasetKind::Breakhis => 8,
            DatasetKind::K19 | DatasetKind::K16 => 7,
            _ => 4,
        }
    }

    pub fn metric_family(&self) -> MetricFamily {
        match self {
            DatasetKind::K19 | DatasetKind::K16 | DatasetKind::Breakhis => MetricFamily::Tissue,
            _ => MetricFamily::Grading,
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetKind {
    type Err = PatchDatasetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DatasetKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| PatchDatasetError::UnsupportedDataset(s.to_string()))
    }
}

/// Which validation metrics a run on this dataset reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricFamily {
    /// Ordinal cancer grading: accuracy, cancer-only accuracy, F1, kappa.
    Grading,
    /// Tissue / tumor typing: accuracy, F1, precision, recall.
    Tissue,
}

impl MetricFamily {
    pub fn metric_names(&self) -> &'static [&'static str] {
        match self {
            MetricFamily::Grading => &["valid_acc", "valid_cancer_acc", "valid_f1", "valid_kappa"],
            MetricFamily::Tissue => &["valid_acc", "valid_f1", "valid_pre", "valid_rec"],
        }
    }
}

/// How a raw path token is turned into a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelMode {
    /// Natural-language class phrase, e.g. `"grade 3 cancer."`.
    #[default]
    Caption,
    /// Per-dataset integer class id.
    ClassIndex,
    /// Shared id space used when several datasets are trained together.
    CombineDataset,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Label {
    Class(u32),
    Caption(String),
}

impl Label {
    pub fn as_caption(&self) -> Option<&str> {
        match self {
            Label::Caption(text) => Some(text),
            Label::Class(_) => None,
        }
    }

    pub fn as_class(&self) -> Option<u32> {
        match self {
            Label::Class(id) => Some(*id),
            Label::Caption(_) => None,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Class(id) => write!(f, "{id}"),
            Label::Caption(text) => f.write_str(text),
        }
    }
}

/// One patch on disk and its label. Identity is the path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub path: PathBuf,
    pub label: Label,
}

impl Sample {
    pub fn new(path: impl Into<PathBuf>, label: Label) -> Self {
        Self {
            path: path.into(),
            label,
        }
    }
}

/// Train/validation/test lists for one dataset. Splits a dataset does not
/// define are left empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetSplits {
    pub train: Vec<Sample>,
    pub valid: Vec<Sample>,
    pub test: Vec<Sample>,
}

impl DatasetSplits {
    pub fn len(&self) -> usize {
        self.train.len() + self.valid.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append another cohort's splits onto these.
    pub fn extend(&mut self, other: DatasetSplits) {
        self.train.extend(other.train);
        self.valid.extend(other.valid);
        self.test.extend(other.test);
    }

    pub fn summary(&self) -> SplitSummary {
        SplitSummary {
            train: self.train.len(),
            valid: self.valid.len(),
            test: self.test.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitSummary {
    pub train: usize,
    pub valid: usize,
    pub test: usize,
}

/// What a training run is conditioning on; decides whether samples carry captions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunType {
    /// Prompted encoder/decoder captioning.
    #[default]
    Prompt,
    /// LoRA-adapted encoder/decoder captioning.
    Lora,
    /// Encoder-only classification on integer labels.
    SingleEncoder,
}

impl RunType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunType::Prompt => "prompt",
            RunType::Lora => "lora",
            RunType::SingleEncoder => "single_encoder",
        }
    }

    pub fn label_mode(&self) -> LabelMode {
        match self {
            RunType::SingleEncoder => LabelMode::ClassIndex,
            _ => LabelMode::Caption,
        }
    }
}

impl fmt::Display for RunType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunType {
    type Err = PatchDatasetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prompt" => Ok(RunType::Prompt),
            "lora" => Ok(RunType::Lora),
            "single_encoder" => Ok(RunType::SingleEncoder),
            other => Err(PatchDatasetError::Other(format!("unknown run type {other}"))),
        }
    }
}
