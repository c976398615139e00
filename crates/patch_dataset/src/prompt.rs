//! Hard prompts and caption assembly.

use crate::types::{DatasetKind, DatasetResult, Label, LabelMode};
use serde::Serialize;

/// Word dropped from the end of a label so "cancer grading ... is grade 3
/// cancer." reads "... is grade 3."
const DUPLICATED_TAIL: &str = "cancer.";

impl DatasetKind {
    /// Fixed natural-language prefix a caption starts with.
    pub fn hard_prompt(&self) -> &'static str {
        match self {
            DatasetKind::Colon1 | DatasetKind::Colon2 => {
                "the cancer grading of this colorectal patch is"
            }
            DatasetKind::Kidney => "the cancer grading of this kidney patch is",
            DatasetKind::Breakhis => "the tumor type of this breast patch is",
            DatasetKind::Liver => "the cancer grading of this liver patch is",
            DatasetKind::Bladder => "the tumor type of this bladder patch is",
            DatasetKind::Prostate1 | DatasetKind::Prostate2 | DatasetKind::Prostate3 => {
                "the cancer grading of this prostate patch is"
            }
            DatasetKind::Gastric => "the cancer grading of this gastric patch is",
            DatasetKind::K19 | DatasetKind::K16 => "the tissue type of this colorectal patch is",
        }
    }

    /// Canonical class phrases, in class-id order.
    pub fn class_phrases(&self) -> &'static [&'static str] {
        match self {
            DatasetKind::Colon1 | DatasetKind::Colon2 => &[
                "benign.",
                "well differentiated cancer.",
                "moderately differentiated cancer.",
                "poorly differentiated cancer.",
            ],
            DatasetKind::Liver => &[
                "normal.",
                "grade 1 cancer.",
                "grade 2 cancer.",
                "grade 3 cancer.",
            ],
            DatasetKind::Kidney => &[
                "normal.",
                "grade 1 cancer.",
                "grade 2 cancer.",
                "grade 3 cancer.",
                "grade 4 cancer.",
            ],
            DatasetKind::Bladder => &["non-tumor.", "low grade cancer.", "high grade cancer."],
            DatasetKind::Breakhis => &[
                "benign - adenosis.",
                "benign - fibroadenoma.",
                "benign - phyllodes tumor.",
                "benign - tubular adenoma.",
                "malignant - ductal carcinoma.",
                "malignant - lobular carcinoma.",
                "malignant - mucinous carcinoma.",
                "malignant - carcinoma.",
            ],
            DatasetKind::Prostate1 | DatasetKind::Prostate2 | DatasetKind::Prostate3 => &[
                "benign.",
                "grade 3 cancer.",
                "grade 4 cancer.",
                "grade 5 cancer.",
            ],
            DatasetKind::Gastric => &[
                "benign.",
                "tubular well differentiated cancer.",
                "tubular moderately differentiated cancer.",
                "tubular poorly differentiated cancer.",
            ],
            DatasetKind::K19 | DatasetKind::K16 => &[
                "adipole.",
                "background.",
                "debris.",
                "lymphocyte.",
                "normal.",
                "stroma.",
                "tumor.",
            ],
        }
    }

    /// Caption for a label under this dataset's prompt. Integer labels have
    /// no phrase and render as their id.
    pub fn caption_for(&self, label: &Label) -> String {
        combine_hard_prompt_with_label(self.hard_prompt(), &label.to_string())
    }
}

/// Prompt lookup by dataset name.
pub fn get_hard_prompt(dataset: &str) -> DatasetResult<&'static str> {
    Ok(dataset.parse::<DatasetKind>()?.hard_prompt())
}

/// Append `label` to `prompt`, dropping a trailing `cancer.` word from the
/// label and joining with exactly one space.
pub fn combine_hard_prompt_with_label(prompt: &str, label: &str) -> String {
    let label = match label.rsplit_once(' ') {
        Some((head, DUPLICATED_TAIL)) => format!("{head}."),
        None if label == DUPLICATED_TAIL => ".".to_string(),
        _ => label.to_string(),
    };
    if prompt.ends_with(' ') {
        format!("{prompt}{label}")
    } else {
        format!("{prompt} {label}")
    }
}

/// Canonical class list for a dataset: full captions or class ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CaptionList {
    Captions(Vec<String>),
    Classes(Vec<u32>),
}

impl CaptionList {
    pub fn len(&self) -> usize {
        match self {
            CaptionList::Captions(c) => c.len(),
            CaptionList::Classes(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_caption(&self, caption: &str) -> bool {
        matches!(self, CaptionList::Captions(c) if c.iter().any(|x| x == caption))
    }
}

pub fn caption_list(kind: DatasetKind, mode: LabelMode) -> CaptionList {
    let phrases = kind.class_phrases();
    match mode {
        LabelMode::Caption => CaptionList::Captions(
            phrases
                .iter()
                .map(|p| combine_hard_prompt_with_label(kind.hard_prompt(), p))
                .collect(),
        ),
        _ => CaptionList::Classes((0..phrases.len() as u32).collect()),
    }
}

/// Caption list lookup by dataset name.
pub fn get_caption(dataset: &str, mode: LabelMode) -> DatasetResult<CaptionList> {
    Ok(caption_list(dataset.parse()?, mode))
}
