//! Per-dataset train/valid/test assembly.
//!
//! Every `prepare_*` function enumerates its dataset's fixed directory
//! convention, labels each file under the requested [`LabelMode`], and returns
//! a [`DatasetSplits`]. Enumeration is sorted, so the only nondeterminism is
//! gastric benign downsampling when no seed is supplied.

use crate::config::{DatasetRoots, GastricCohort};
use crate::enumerate::{glob_files, glob_many};
use crate::labels;
use crate::types::{
    DatasetKind, DatasetResult, DatasetSplits, Label, LabelMode, PatchDatasetError, Sample,
};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Seed of the fixed k16 shuffle.
pub const K16_SHUFFLE_SEED: u64 = 5;
/// Fraction of k16 held out; half goes to valid, half to test.
const K16_HOLDOUT_RATIO: f64 = 0.3;
/// Benign gastric train patches are cut to `tumor / BENIGN_DOWNSAMPLE_DIVISOR`.
const BENIGN_DOWNSAMPLE_DIVISOR: usize = 3;

/// Knobs that only some datasets read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrepareOptions {
    /// Gastric class grouping (selects the ground-truth → class table).
    pub gastric_classes: u32,
    /// Seed for gastric benign downsampling; `None` draws from the thread RNG.
    pub downsample_seed: Option<u64>,
    /// BreakHis fold file to read.
    pub breakhis_fold: u32,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            gastric_classes: 4,
            downsample_seed: None,
            breakhis_fold: 1,
        }
    }
}

/// Build the splits for `kind` from the configured roots.
pub fn prepare_dataset(
    kind: DatasetKind,
    roots: &DatasetRoots,
    mode: LabelMode,
    opts: &PrepareOptions,
) -> DatasetResult<DatasetSplits> {
    let splits = match kind {
        DatasetKind::Colon1 => prepare_colon(&roots.colon, mode)?,
        DatasetKind::Colon2 => prepare_colon_test2(&roots.colon_test2, mode)?,
        DatasetKind::Prostate1 => prepare_prostate_uhu(&roots.prostate_uhu, mode)?,
        DatasetKind::Prostate2 => prepare_prostate_ubc(&roots.prostate_ubc, mode)?,
        DatasetKind::Prostate3 => prepare_prostate_aggc(&roots.prostate_aggc, mode)?,
        DatasetKind::Gastric => prepare_gastric(
            &roots.gastric_her01,
            &roots.gastric_addition,
            mode,
            opts.gastric_classes,
            opts.downsample_seed,
        )?,
        DatasetKind::K19 => prepare_k19(&roots.k19, &roots.k19_split, mode)?,
        DatasetKind::K16 => prepare_k16(&roots.k16, mode)?,
        DatasetKind::Kidney => prepare_kidney(&roots.kidney, mode)?,
        DatasetKind::Liver => prepare_liver(&roots.liver, mode)?,
        DatasetKind::Bladder => prepare_bladder(&roots.bladder, mode)?,
        DatasetKind::Breakhis => prepare_breakhis(
            &roots.breakhis_images,
            &roots.breakhis_split_for(opts.breakhis_fold),
            mode,
        )?,
    };
    let summary = splits.summary();
    info!(
        dataset = %kind,
        ?mode,
        train = summary.train,
        valid = summary.valid,
        test = summary.test,
        "prepared splits"
    );
    Ok(splits)
}

/// Label every path with `label_fn`, failing on the first unmapped token.
fn label_all<F>(files: Vec<PathBuf>, label_fn: F) -> DatasetResult<Vec<Sample>>
where
    F: Fn(&Path) -> DatasetResult<Label>,
{
    files
        .into_iter()
        .map(|path| {
            let label = label_fn(&path)?;
            Ok(Sample::new(path, label))
        })
        .collect()
}

fn labelled<F>(root: &Path, patterns: &[&str], label_fn: F) -> DatasetResult<Vec<Sample>>
where
    F: Fn(&Path) -> DatasetResult<Label>,
{
    label_all(glob_many(root, patterns)?, label_fn)
}

/// KBSMC colon: six TMA and three WSI folders, partitioned by folder.
pub fn prepare_colon(root: &Path, mode: LabelMode) -> DatasetResult<DatasetSplits> {
    let label = |p: &Path| labels::colon_label(p, mode);
    Ok(DatasetSplits {
        train: labelled(
            root,
            &[
                "tma_01/*.jpg",
                "tma_02/*.jpg",
                "tma_03/*.jpg",
                "tma_05/*.jpg",
                "wsi_01/*.jpg",
            ],
            label,
        )?,
        valid: labelled(root, &["tma_06/*.jpg", "wsi_03/*.jpg"], label)?,
        test: labelled(root, &["tma_04/*.jpg", "wsi_02/*.jpg"], label)?,
    })
}

/// Slide ids of the second KBSMC colon test cohort.
pub fn colon_test2_wsis() -> Vec<String> {
    (1..=35)
        .chain([90])
        .chain(92..=100)
        .map(|id| format!("wsi_{id:03}"))
        .collect()
}

/// Second KBSMC colon cohort; test only.
pub fn prepare_colon_test2(root: &Path, mode: LabelMode) -> DatasetResult<DatasetSplits> {
    let mut files = Vec::new();
    for wsi in colon_test2_wsis() {
        files.extend(glob_files(root, &format!("{wsi}/*/*.png"))?);
    }
    Ok(DatasetSplits {
        test: label_all(files, |p| labels::colon_test2_label(p, mode))?,
        ..DatasetSplits::default()
    })
}

/// Harvard prostate TMAs: ZT111/199/204 train, ZT76 valid, patho_1 test.
pub fn prepare_prostate_uhu(root: &Path, mode: LabelMode) -> DatasetResult<DatasetSplits> {
    let label = |p: &Path| labels::prostate_uhu_label(p, mode);
    Ok(DatasetSplits {
        train: labelled(
            root,
            &[
                "patches_train_750_v0/ZT111*/*.jpg",
                "patches_train_750_v0/ZT199*/*.jpg",
                "patches_train_750_v0/ZT204*/*.jpg",
            ],
            label,
        )?,
        valid: labelled(root, &["patches_validation_750_v0/ZT76*/*.jpg"], label)?,
        test: labelled(root, &["patches_test_750_v0/patho_1/*/*.jpg"], label)?,
    })
}

/// UBC prostate patches; test only.
pub fn prepare_prostate_ubc(root: &Path, mode: LabelMode) -> DatasetResult<DatasetSplits> {
    Ok(DatasetSplits {
        test: labelled(root, &["*/*.jpg"], |p| labels::prostate_ubc_label(p, mode))?,
        ..DatasetSplits::default()
    })
}

/// AGGC 2022 prostate subsets; train only, grades 0 and 1 dropped.
pub fn prepare_prostate_aggc(root: &Path, mode: LabelMode) -> DatasetResult<DatasetSplits> {
    let files = glob_many(
        root,
        &[
            "Subset1_Train_image/*/*",
            "Subset2_Train_image/*/*",
            "Subset3_Train_image/*/*/*",
        ],
    )?;
    let mut train = Vec::with_capacity(files.len());
    for path in files {
        let grade = labels::prostate_aggc_grade(&path)?;
        if grade <= 1 {
            continue;
        }
        let label = labels::prostate_aggc_label(grade, &path, mode)?;
        train.push(Sample::new(path, label));
    }
    Ok(DatasetSplits {
        train,
        ..DatasetSplits::default()
    })
}

#[derive(Debug, Deserialize)]
struct GastricSplitRow {
    #[serde(rename = "WSI")]
    wsi: String,
    #[serde(rename = "Task")]
    task: String,
}

/// Slide ids per split, in sheet order.
#[derive(Debug, Default)]
struct GastricSheet {
    train: Vec<String>,
    valid: Vec<String>,
    test: Vec<String>,
}

fn read_gastric_sheet(path: &Path) -> DatasetResult<GastricSheet> {
    let csv_err = |source| PatchDatasetError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
    let mut sheet = GastricSheet::default();
    for row in reader.deserialize::<GastricSplitRow>() {
        let row = row.map_err(csv_err)?;
        match row.task.as_str() {
            "train" => sheet.train.push(row.wsi),
            "val" => sheet.valid.push(row.wsi),
            "test" => sheet.test.push(row.wsi),
            other => debug!(wsi = %row.wsi, task = other, "gastric sheet: ignoring task"),
        }
    }
    Ok(sheet)
}

/// Class ids of every kept patch under the listed slides.
fn gastric_classes(
    root: &Path,
    wsis: &[String],
    table: labels::Table<u32, u32>,
    mode: LabelMode,
) -> DatasetResult<Vec<(PathBuf, u32)>> {
    let mut out = Vec::new();
    for wsi in wsis {
        for path in glob_files(root, &format!("{wsi}/*.jpg"))? {
            let class = labels::gastric_class(&path, table)?;
            if labels::gastric_keeps(class, mode) {
                out.push((path, class));
            }
        }
    }
    Ok(out)
}

/// Shuffle benign (class 0) patches and keep at most `tumor / 3` of them.
/// Benign patches come first in the result.
pub fn downsample_benign<T>(
    items: Vec<(T, u32)>,
    rng: &mut dyn rand::RngCore,
) -> Vec<(T, u32)> {
    let (mut benign, tumor): (Vec<_>, Vec<_>) = items.into_iter().partition(|(_, c)| *c == 0);
    benign.shuffle(rng);
    benign.truncate(tumor.len() / BENIGN_DOWNSAMPLE_DIVISOR);
    benign.extend(tumor);
    benign
}

fn gastric_samples(items: Vec<(PathBuf, u32)>, mode: LabelMode) -> DatasetResult<Vec<Sample>> {
    items
        .into_iter()
        .map(|(path, class)| {
            let label = labels::gastric_label(class, &path, mode)?;
            Ok(Sample::new(path, label))
        })
        .collect()
}

fn load_gastric_cohort(
    cohort: &GastricCohort,
    table: labels::Table<u32, u32>,
    mode: LabelMode,
    downsample: Option<&mut dyn rand::RngCore>,
) -> DatasetResult<DatasetSplits> {
    let sheet = read_gastric_sheet(&cohort.split_csv)?;
    let mut train = gastric_classes(&cohort.train_root, &sheet.train, table, mode)?;
    if let Some(rng) = downsample {
        let before = train.len();
        train = downsample_benign(train, rng);
        debug!(before, after = train.len(), "gastric benign downsampling");
    }
    Ok(DatasetSplits {
        train: gastric_samples(train, mode)?,
        valid: gastric_samples(
            gastric_classes(&cohort.eval_root, &sheet.valid, table, mode)?,
            mode,
        )?,
        test: gastric_samples(
            gastric_classes(&cohort.eval_root, &sheet.test, table, mode)?,
            mode,
        )?,
    })
}

/// Gastric WSIs from two cohorts. The first cohort's benign train patches are
/// downsampled; the addition cohort is appended as is.
pub fn prepare_gastric(
    her01: &GastricCohort,
    addition: &GastricCohort,
    mode: LabelMode,
    nr_classes: u32,
    seed: Option<u64>,
) -> DatasetResult<DatasetSplits> {
    let table = labels::gastric_class_table(nr_classes);
    let mut seeded;
    let mut thread;
    let rng: &mut dyn rand::RngCore = match seed {
        Some(seed) => {
            seeded = rand::rngs::StdRng::seed_from_u64(seed);
            &mut seeded
        }
        None => {
            thread = rand::rng();
            &mut thread
        }
    };
    let mut splits = load_gastric_cohort(her01, table, mode, Some(rng))?;
    splits.extend(load_gastric_cohort(addition, table, mode, None)?);
    Ok(splits)
}

#[derive(Debug, Deserialize)]
struct K19SplitFile {
    train_set: Vec<(String, u32)>,
    valid_set: Vec<(String, u32)>,
    test_set: Vec<(String, u32)>,
}

/// NCT-CRC-HE-100K from a JSON split listing of `[relative_path, class]` pairs.
pub fn prepare_k19(root: &Path, split_json: &Path, mode: LabelMode) -> DatasetResult<DatasetSplits> {
    let raw = std::fs::read_to_string(split_json).map_err(|e| PatchDatasetError::Io {
        path: split_json.to_path_buf(),
        source: e,
    })?;
    let file: K19SplitFile = serde_json::from_str(&raw).map_err(|e| PatchDatasetError::Json {
        path: split_json.to_path_buf(),
        source: e,
    })?;
    let convert = |entries: Vec<(String, u32)>| -> DatasetResult<Vec<Sample>> {
        entries
            .into_iter()
            .map(|(rel, class)| {
                let path = root.join(rel.trim_start_matches('/'));
                let label = labels::k19_label(class, &path, mode)?;
                Ok(Sample::new(path, label))
            })
            .collect()
    };
    Ok(DatasetSplits {
        train: convert(file.train_set)?,
        valid: convert(file.valid_set)?,
        test: convert(file.test_set)?,
    })
}

/// `(valid_end, holdout_end)` cut points for a k16 list of length `n`:
/// valid is `[..valid_end]`, test `[valid_end..holdout_end]`, train the rest.
pub fn k16_cut_points(n: usize) -> (usize, usize) {
    let valid_end = (K16_HOLDOUT_RATIO / 2.0 * n as f64) as usize;
    let holdout_end = (K16_HOLDOUT_RATIO * n as f64) as usize;
    (valid_end, holdout_end)
}

/// Kather 2016 tiles without the mixed-tissue folder, shuffled with a fixed
/// seed and cut 70 / 15 / 15.
pub fn prepare_k16(root: &Path, mode: LabelMode) -> DatasetResult<DatasetSplits> {
    let files: Vec<PathBuf> = glob_files(root, "*/*.tif")?
        .into_iter()
        .filter(|p| labels::parent_name(p) != labels::K16_EXCLUDED_DIR)
        .collect();
    let mut all = label_all(files, |p| labels::k16_label(p, mode))?;
    all.shuffle(&mut ChaCha8Rng::seed_from_u64(K16_SHUFFLE_SEED));

    let (valid_end, holdout_end) = k16_cut_points(all.len());
    let train = all.split_off(holdout_end);
    let test = all.split_off(valid_end);
    Ok(DatasetSplits {
        train,
        valid: all,
        test,
    })
}

fn prepare_grading_tree<F>(root: &Path, label_fn: F) -> DatasetResult<DatasetSplits>
where
    F: Fn(&Path) -> DatasetResult<Label>,
{
    Ok(DatasetSplits {
        train: labelled(root, &["Training/*/*"], &label_fn)?,
        valid: labelled(root, &["Validation/*/*"], &label_fn)?,
        test: labelled(root, &["Test/*/*"], &label_fn)?,
    })
}

pub fn prepare_kidney(root: &Path, mode: LabelMode) -> DatasetResult<DatasetSplits> {
    prepare_grading_tree(root, |p| labels::kidney_label(p, mode))
}

pub fn prepare_liver(root: &Path, mode: LabelMode) -> DatasetResult<DatasetSplits> {
    prepare_grading_tree(root, |p| labels::liver_label(p, mode))
}

pub fn prepare_bladder(root: &Path, mode: LabelMode) -> DatasetResult<DatasetSplits> {
    let label = |p: &Path| labels::bladder_label(p, mode);
    Ok(DatasetSplits {
        train: labelled(root, &["train/*/*/*"], label)?,
        valid: labelled(root, &["val/*/*/*"], label)?,
        test: labelled(root, &["test/*/*/*"], label)?,
    })
}

/// BreakHis from a fold listing with one `name|...|kind` record per line.
/// `train` records go to train and everything else to test.
pub fn prepare_breakhis(
    images: &Path,
    split_file: &Path,
    mode: LabelMode,
) -> DatasetResult<DatasetSplits> {
    let raw = std::fs::read_to_string(split_file).map_err(|e| PatchDatasetError::Io {
        path: split_file.to_path_buf(),
        source: e,
    })?;
    let mut splits = DatasetSplits::default();
    for line in raw.lines().map(str::trim_end).filter(|l| !l.is_empty()) {
        let name = line.split('|').next().unwrap_or_default();
        let kind = line.rsplit('|').next().unwrap_or_default();
        let path = images.join(name);
        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or(name)
            .to_string();
        let sample = Sample::new(path.clone(), labels::breakhis_label(&file_name, &path, mode)?);
        if kind == "train" {
            splits.train.push(sample);
        } else {
            splits.test.push(sample);
        }
    }
    Ok(splits)
}
