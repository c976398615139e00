//! Per-dataset label tables and path-token parsing.
//!
//! Each dataset encodes its ground truth somewhere in the patch path: a
//! filename suffix digit, the parent directory name, or a code that a
//! separate table resolves. The tables here are fixed facts about the
//! source datasets; an unseen token is an error, never a fallback.

use crate::types::{DatasetKind, DatasetResult, Label, LabelMode, PatchDatasetError};
use std::path::Path;

/// Fixed lookup table, scanned linearly.
pub type Table<K, V> = &'static [(K, V)];

const COLON_CAPTIONS: Table<&str, &str> = &[
    ("0", "benign."),
    ("1", "well differentiated cancer."),
    ("2", "moderately differentiated cancer."),
    ("3", "poorly differentiated cancer."),
];

const COLON_TEST2_CAPTIONS: Table<&str, &str> = &[
    ("1", "benign."),
    ("2", "well differentiated cancer."),
    ("3", "moderately differentiated cancer."),
    ("4", "poorly differentiated cancer."),
];

const PROSTATE_UHU_CAPTIONS: Table<&str, &str> = &[
    ("0", "benign."),
    ("1", "grade 3 cancer."),
    ("2", "grade 4 cancer."),
    ("3", "grade 5 cancer."),
];

const PROSTATE_UHU_COMBINED: Table<u32, u32> = &[(0, 0), (1, 4), (2, 5), (3, 6)];

const PROSTATE_UBC_CAPTIONS: Table<u32, &str> = &[
    (0, "benign."),
    (2, "grade 3 cancer."),
    (3, "grade 4 cancer."),
    (4, "grade 5 cancer."),
];

const PROSTATE_UBC_COMBINED: Table<u32, u32> = &[(0, 0), (2, 4), (3, 5), (4, 6)];

const PROSTATE_AGGC_CAPTIONS: Table<u32, &str> = &[
    (2, "benign."),
    (3, "grade 3 cancer."),
    (4, "grade 4 cancer."),
    (5, "grade 5 cancer."),
];

/// Class id (after the ground-truth table) that marks patches to drop.
pub const GASTRIC_OTHER_CLASS: u32 = 4;

const GASTRIC_CAPTIONS: Table<u32, &str> = &[
    (0, "benign."),
    (1, "tubular well differentiated cancer."),
    (2, "tubular moderately differentiated cancer."),
    (3, "tubular poorly differentiated cancer."),
    (4, "other"),
];

const GASTRIC_COMBINED: Table<u32, u32> = &[(0, 0), (1, 7), (2, 8), (3, 9), (4, 2)];

// Ground-truth codes: 1-2 BN, 3 TW, 4 TM, 5 TP, 6 TLS, 7 papillary,
// 8 mucinous, 9 signet, 10 poorly cohesive, 11 LVI.
const GASTRIC_GT_3: Table<u32, u32> = &[
    (1, 4), (2, 4), (3, 0), (4, 1), (5, 2), (6, 4), (7, 4), (8, 4), (9, 4), (10, 4), (11, 4),
];
const GASTRIC_GT_4: Table<u32, u32> = &[
    (1, 0), (2, 0), (3, 1), (4, 2), (5, 3), (6, 4), (7, 4), (8, 4), (9, 4), (10, 4), (11, 4),
];
const GASTRIC_GT_5: Table<u32, u32> = &[
    (1, 0), (2, 0), (3, 1), (4, 2), (5, 3), (6, 8), (7, 8), (8, 8), (9, 4), (10, 4), (11, 8),
];
const GASTRIC_GT_6: Table<u32, u32> = &[
    (1, 0), (2, 0), (3, 2), (4, 2), (5, 2), (6, 1), (7, 3), (8, 4), (9, 5), (10, 5), (11, 6),
];
const GASTRIC_GT_8: Table<u32, u32> = &[
    (1, 0), (2, 0), (3, 2), (4, 3), (5, 4), (6, 1), (7, 5), (8, 6), (9, 7), (10, 7), (11, 8),
];
const GASTRIC_GT_10: Table<u32, u32> = &[
    (1, 0), (2, 0), (3, 1), (4, 2), (5, 3), (6, 4), (7, 5), (8, 6), (9, 7), (10, 8), (11, 9),
];
const GASTRIC_GT_FALLBACK: Table<u32, u32> = &[
    (1, 0), (2, 0), (3, 1), (4, 2), (5, 3), (6, 8), (7, 8), (8, 5), (9, 4), (10, 4), (11, 8),
];

const K19_CAPTIONS: Table<u32, &str> = &[
    (0, "adipole."),
    (1, "background."),
    (2, "debris."),
    (3, "lymphocyte."),
    // mucus folds into debris, muscle into stroma
    (4, "debris."),
    (5, "stroma."),
    (6, "normal."),
    (7, "stroma."),
    (8, "tumor."),
];

/// Offset that moves k19 class ids into the combined-dataset id space.
const K19_COMBINED_OFFSET: u32 = 10;

/// Kather-2016 directory that is never used.
pub const K16_EXCLUDED_DIR: &str = "03_COMPLEX";

const K16_CAPTIONS: Table<&str, &str> = &[
    ("07_ADIPOSE", "adipole tissue."),
    ("08_EMPTY", "background tissue."),
    ("05_DEBRIS", "debris tissue."),
    ("04_LYMPHO", "lymphocyte tissue."),
    ("06_MUCOSA", "normal tissue."),
    ("02_STROMA", "stroma tissue."),
    ("01_TUMOR", "tumor tissue."),
];

const K16_CLASSES: Table<&str, u32> = &[
    ("07_ADIPOSE", 6),
    ("08_EMPTY", 7),
    ("05_DEBRIS", 4),
    ("04_LYMPHO", 3),
    ("06_MUCOSA", 5),
    ("02_STROMA", 2),
    ("01_TUMOR", 1),
];

const KIDNEY_CAPTIONS: Table<&str, &str> = &[
    ("0", "normal."),
    ("1", "grade 1 cancer."),
    ("2", "grade 2 cancer."),
    ("3", "grade 3 cancer."),
    ("4", "grade 4 cancer."),
];

const LIVER_CAPTIONS: Table<&str, &str> = &[
    ("0", "normal."),
    ("1", "grade 1 cancer."),
    ("2", "grade 2 cancer."),
    ("3", "grade 3 cancer."),
];

const BLADDER_CAPTIONS: Table<&str, &str> = &[
    ("1", "low grade cancer."),
    ("2", "high grade cancer."),
    ("3", "non-tumor."),
];

const BREAKHIS_CAPTIONS: Table<&str, &str> = &[
    ("A", "benign - adenosis."),
    ("F", "benign - fibroadenoma."),
    ("PT", "benign - phyllodes tumor."),
    ("TA", "benign - tubular adenoma."),
    ("DC", "malignant - ductal carcinoma."),
    ("LC", "malignant - lobular carcinoma."),
    ("MC", "malignant - mucinous carcinoma."),
    ("PC", "malignant - papillary carcinoma."),
];

const BREAKHIS_CLASSES: Table<&str, u32> = &[
    ("A", 0),
    ("F", 1),
    ("PT", 2),
    ("TA", 3),
    ("DC", 4),
    ("LC", 5),
    ("MC", 6),
    ("PC", 7),
];

fn lookup<K: PartialEq + Copy, V: Copy>(table: &[(K, V)], key: K) -> Option<V> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

fn unmapped(kind: DatasetKind, token: impl ToString, path: &Path) -> PatchDatasetError {
    PatchDatasetError::UnmappedLabel {
        dataset: kind,
        token: token.to_string(),
        path: path.to_path_buf(),
    }
}

fn caption(
    kind: DatasetKind,
    table: Table<&'static str, &'static str>,
    token: &str,
    path: &Path,
) -> DatasetResult<Label> {
    lookup(table, token)
        .map(|text| Label::Caption(text.to_string()))
        .ok_or_else(|| unmapped(kind, token, path))
}

fn parse_code(kind: DatasetKind, token: &str, path: &Path) -> DatasetResult<u32> {
    token.parse::<u32>().map_err(|_| unmapped(kind, token, path))
}

fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|s| s.to_str()).unwrap_or_default()
}

/// Last `_`-separated segment of the file name, extension removed:
/// `tma_01_patch_12_2.jpg` → `2`.
pub fn suffix_token(path: &Path) -> &str {
    let last = file_name(path).rsplit('_').next().unwrap_or_default();
    last.split('.').next().unwrap_or_default()
}

/// First character of the last `_`-separated segment: `x_4.png` → `4`.
pub fn suffix_first_char(path: &Path) -> &str {
    let last = file_name(path).rsplit('_').next().unwrap_or_default();
    last.char_indices()
        .nth(1)
        .map(|(end, _)| &last[..end])
        .unwrap_or(last)
}

/// Name of the directory holding the file.
pub fn parent_name(path: &Path) -> &str {
    path.parent()
        .and_then(|p| p.file_name())
        .and_then(|s| s.to_str())
        .unwrap_or_default()
}

/// Last character of the parent directory name: `grade3/x.png` → `3`.
pub fn parent_last_char(path: &Path) -> &str {
    let parent = parent_name(path);
    parent
        .char_indices()
        .last()
        .map(|(start, _)| &parent[start..])
        .unwrap_or(parent)
}

/// KBSMC colon TMA/WSI patches, suffix digit `0..3`.
pub fn colon_label(path: &Path, mode: LabelMode) -> DatasetResult<Label> {
    let kind = DatasetKind::Colon1;
    let token = suffix_token(path);
    match mode {
        LabelMode::Caption => caption(kind, COLON_CAPTIONS, token, path),
        _ => Ok(Label::Class(parse_code(kind, token, path)?)),
    }
}

/// KBSMC colon second test cohort, suffix digit `1..4`.
pub fn colon_test2_label(path: &Path, mode: LabelMode) -> DatasetResult<Label> {
    let kind = DatasetKind::Colon2;
    let token = suffix_token(path);
    match mode {
        LabelMode::Caption => caption(kind, COLON_TEST2_CAPTIONS, token, path),
        _ => parse_code(kind, token, path)?
            .checked_sub(1)
            .map(Label::Class)
            .ok_or_else(|| unmapped(kind, token, path)),
    }
}

/// Harvard prostate patches, suffix digit `0..3`.
pub fn prostate_uhu_label(path: &Path, mode: LabelMode) -> DatasetResult<Label> {
    let kind = DatasetKind::Prostate1;
    let token = suffix_token(path);
    match mode {
        LabelMode::Caption => caption(kind, PROSTATE_UHU_CAPTIONS, token, path),
        LabelMode::CombineDataset => {
            let code = parse_code(kind, token, path)?;
            lookup(PROSTATE_UHU_COMBINED, code)
                .map(Label::Class)
                .ok_or_else(|| unmapped(kind, token, path))
        }
        LabelMode::ClassIndex => Ok(Label::Class(parse_code(kind, token, path)?)),
    }
}

/// UBC prostate patches, suffix digit in `{0, 2, 3, 4}`.
pub fn prostate_ubc_label(path: &Path, mode: LabelMode) -> DatasetResult<Label> {
    let kind = DatasetKind::Prostate2;
    let token = suffix_token(path);
    let code = parse_code(kind, token, path)?;
    match mode {
        LabelMode::Caption => lookup(PROSTATE_UBC_CAPTIONS, code)
            .map(|text| Label::Caption(text.to_string()))
            .ok_or_else(|| unmapped(kind, token, path)),
        LabelMode::CombineDataset => lookup(PROSTATE_UBC_COMBINED, code)
            .map(Label::Class)
            .ok_or_else(|| unmapped(kind, token, path)),
        LabelMode::ClassIndex => Ok(Label::Class(code.saturating_sub(1))),
    }
}

/// AGGC 2022 grade digit; callers drop grades `0` and `1` before labelling.
pub fn prostate_aggc_grade(path: &Path) -> DatasetResult<u32> {
    let token = suffix_first_char(path);
    parse_code(DatasetKind::Prostate3, token, path)
}

pub fn prostate_aggc_label(grade: u32, path: &Path, mode: LabelMode) -> DatasetResult<Label> {
    let kind = DatasetKind::Prostate3;
    match mode {
        LabelMode::Caption => lookup(PROSTATE_AGGC_CAPTIONS, grade)
            .map(|text| Label::Caption(text.to_string()))
            .ok_or_else(|| unmapped(kind, grade, path)),
        _ => grade
            .checked_sub(2)
            .map(Label::Class)
            .ok_or_else(|| unmapped(kind, grade, path)),
    }
}

/// Ground-truth code → class table for a gastric class grouping.
pub fn gastric_class_table(nr_classes: u32) -> Table<u32, u32> {
    match nr_classes {
        3 => GASTRIC_GT_3,
        4 => GASTRIC_GT_4,
        5 => GASTRIC_GT_5,
        6 => GASTRIC_GT_6,
        8 => GASTRIC_GT_8,
        10 => GASTRIC_GT_10,
        _ => GASTRIC_GT_FALLBACK,
    }
}

/// Map a gastric patch's ground-truth code (filename suffix) to its class id.
pub fn gastric_class(path: &Path, table: Table<u32, u32>) -> DatasetResult<u32> {
    let kind = DatasetKind::Gastric;
    let token = suffix_token(path);
    let code = parse_code(kind, token, path)?;
    lookup(table, code).ok_or_else(|| unmapped(kind, token, path))
}

/// Whether a gastric class survives the "other" filter under `mode`.
///
/// Caption and combined modes error on classes beyond the sentinel when the
/// label is rendered, so only the sentinel itself is dropped here; class-index
/// mode keeps the four tubular grades only.
pub fn gastric_keeps(class: u32, mode: LabelMode) -> bool {
    match mode {
        LabelMode::ClassIndex => class < GASTRIC_OTHER_CLASS,
        _ => class != GASTRIC_OTHER_CLASS,
    }
}

pub fn gastric_label(class: u32, path: &Path, mode: LabelMode) -> DatasetResult<Label> {
    let kind = DatasetKind::Gastric;
    match mode {
        LabelMode::Caption => lookup(GASTRIC_CAPTIONS, class)
            .map(|text| Label::Caption(text.to_string()))
            .ok_or_else(|| unmapped(kind, class, path)),
        LabelMode::CombineDataset => lookup(GASTRIC_COMBINED, class)
            .map(Label::Class)
            .ok_or_else(|| unmapped(kind, class, path)),
        LabelMode::ClassIndex => Ok(Label::Class(class)),
    }
}

/// NCT-CRC-HE-100K class id from the split listing.
pub fn k19_label(class: u32, path: &Path, mode: LabelMode) -> DatasetResult<Label> {
    let kind = DatasetKind::K19;
    match mode {
        LabelMode::Caption => lookup(K19_CAPTIONS, class)
            .map(|text| Label::Caption(text.to_string()))
            .ok_or_else(|| unmapped(kind, class, path)),
        LabelMode::CombineDataset => Ok(Label::Class(class + K19_COMBINED_OFFSET)),
        LabelMode::ClassIndex => Ok(Label::Class(class)),
    }
}

/// Kather 2016 tiles, labelled by parent directory.
pub fn k16_label(path: &Path, mode: LabelMode) -> DatasetResult<Label> {
    let kind = DatasetKind::K16;
    let token = parent_name(path);
    match mode {
        LabelMode::Caption => caption(kind, K16_CAPTIONS, token, path),
        _ => lookup(K16_CLASSES, token)
            .map(Label::Class)
            .ok_or_else(|| unmapped(kind, token, path)),
    }
}

fn parent_digit_label(
    kind: DatasetKind,
    table: Table<&'static str, &'static str>,
    path: &Path,
    mode: LabelMode,
) -> DatasetResult<Label> {
    let token = parent_last_char(path);
    match mode {
        LabelMode::Caption => caption(kind, table, token, path),
        _ => Ok(Label::Class(parse_code(kind, token, path)?)),
    }
}

pub fn kidney_label(path: &Path, mode: LabelMode) -> DatasetResult<Label> {
    parent_digit_label(DatasetKind::Kidney, KIDNEY_CAPTIONS, path, mode)
}

pub fn liver_label(path: &Path, mode: LabelMode) -> DatasetResult<Label> {
    parent_digit_label(DatasetKind::Liver, LIVER_CAPTIONS, path, mode)
}

/// Bladder patches; parent directory ends in `1` (low grade), `2` (high
/// grade), or `3` (non-tumor). Class-index mode also folds `4` into `0`.
pub fn bladder_label(path: &Path, mode: LabelMode) -> DatasetResult<Label> {
    let kind = DatasetKind::Bladder;
    let token = parent_last_char(path);
    match mode {
        LabelMode::Caption => caption(kind, BLADDER_CAPTIONS, token, path),
        _ => {
            let idx = parse_code(kind, token, path)?
                .checked_sub(1)
                .ok_or_else(|| unmapped(kind, token, path))?;
            Ok(Label::Class(if idx == 3 { 0 } else { idx }))
        }
    }
}

/// BreakHis tumor code from a file name like `SOB_B_A-14-22549AB-40-001.png`.
pub fn breakhis_code(file_name: &str) -> &str {
    let head = file_name.split('-').next().unwrap_or_default();
    head.rsplit('_').next().unwrap_or_default()
}

pub fn breakhis_label(file_name: &str, path: &Path, mode: LabelMode) -> DatasetResult<Label> {
    let kind = DatasetKind::Breakhis;
    let code = breakhis_code(file_name);
    match mode {
        LabelMode::Caption => caption(kind, BREAKHIS_CAPTIONS, code, path),
        _ => lookup(BREAKHIS_CLASSES, code)
            .map(Label::Class)
            .ok_or_else(|| unmapped(kind, code, path)),
    }
}
