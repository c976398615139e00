//! Dataset root configuration.
//!
//! Every dataset lives under its own directory tree. Roots default to
//! `datasets/<name>` relative to `data_root`, and any of them can be
//! overridden from a TOML file (`patch-dataset.toml`, or the path in
//! `PATCH_DATASET_CONFIG`). `~` and `${VAR}` are expanded in every path.

use crate::types::{DatasetResult, PatchDatasetError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const DEFAULT_CONFIG_NAME: &str = "patch-dataset.toml";
const CONFIG_ENV: &str = "PATCH_DATASET_CONFIG";

/// One gastric cohort: a split sheet plus the patch trees it points into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GastricCohort {
    /// CSV with `WSI` and `Task` columns.
    pub split_csv: PathBuf,
    /// Patch tree used for the train split (dense, step 0.5 tiling).
    pub train_root: PathBuf,
    /// Patch tree used for valid/test (sparse, step 1.0 tiling).
    pub eval_root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRoots {
    pub data_root: PathBuf,
    pub colon: PathBuf,
    pub colon_test2: PathBuf,
    pub prostate_uhu: PathBuf,
    pub prostate_ubc: PathBuf,
    pub prostate_aggc: PathBuf,
    pub gastric_her01: GastricCohort,
    pub gastric_addition: GastricCohort,
    pub k19: PathBuf,
    pub k19_split: PathBuf,
    pub k16: PathBuf,
    pub kidney: PathBuf,
    pub liver: PathBuf,
    pub bladder: PathBuf,
    pub breakhis_images: PathBuf,
    /// Split listing; `{fold}` is replaced by the requested fold number.
    pub breakhis_split: String,
}

impl Default for DatasetRoots {
    fn default() -> Self {
        Self::under(PathBuf::from("datasets"))
    }
}

#[derive(Debug, Deserialize, Default)]
struct DatasetRootsFile {
    data_root: Option<String>,
    colon: Option<String>,
    colon_test2: Option<String>,
    prostate_uhu: Option<String>,
    prostate_ubc: Option<String>,
    prostate_aggc: Option<String>,
    k19: Option<String>,
    k19_split: Option<String>,
    k16: Option<String>,
    kidney: Option<String>,
    liver: Option<String>,
    bladder: Option<String>,
    breakhis_images: Option<String>,
    breakhis_split: Option<String>,
    gastric: Option<GastricSection>,
}

#[derive(Debug, Deserialize, Default)]
struct GastricSection {
    her01: Option<CohortSection>,
    addition: Option<CohortSection>,
}

#[derive(Debug, Deserialize, Default)]
struct CohortSection {
    split_csv: Option<String>,
    train_root: Option<String>,
    eval_root: Option<String>,
}

impl DatasetRoots {
    /// Default layout rooted at `data_root`.
    pub fn under(data_root: PathBuf) -> Self {
        let gastric = data_root.join("gastric");
        Self {
            colon: data_root.join("KBSMC_512"),
            colon_test2: data_root.join("KBSMC_512_test2/KBSMC_test_2"),
            prostate_uhu: data_root.join("prostate_harvard"),
            prostate_ubc: data_root.join("prostate_miccai_2019_patches_690_80_step05_test"),
            prostate_aggc: data_root.join("AGGC22_patch_512_c08"),
            gastric_her01: GastricCohort {
                split_csv: gastric.join("gastric_cancer_wsi_1024_80_her01_split.csv"),
                train_root: gastric
                    .join("gastric_wsi/gastric_cancer_wsi_1024_80_her01_step05_bright230_resize05"),
                eval_root: gastric
                    .join("gastric_wsi/gastric_cancer_wsi_1024_80_her01_step10_bright230_resize05"),
            },
            gastric_addition: GastricCohort {
                split_csv: gastric.join("gastric_wsi_addition_PS1024_ano08_split.csv"),
                train_root: gastric.join(
                    "gastric_wsi_addition/gastric_wsi_addition_PS1024_ano08_step05_bright230_resize05",
                ),
                eval_root: gastric.join(
                    "gastric_wsi_addition/gastric_wsi_addition_PS1024_ano08_step10_bright230_resize05",
                ),
            },
            k19: data_root.join("NCT-CRC-HE-100K"),
            k19_split: data_root.join("K19_9class_split.json"),
            k16: data_root.join("Kather_texture_2016_image_tiles_5000"),
            kidney: data_root.join("kidney_grading"),
            liver: data_root.join("liver_grading"),
            bladder: data_root.join("prosessed_bladder_data_1024_2"),
            breakhis_images: data_root.join("breasthis/imgs"),
            breakhis_split: data_root
                .join("breasthis/fold{fold}_new.txt")
                .to_string_lossy()
                .into_owned(),
            data_root,
        }
    }

    /// Load from `PATCH_DATASET_CONFIG` or `patch-dataset.toml`, falling back to
    /// defaults when neither file exists.
    pub fn load() -> DatasetResult<Self> {
        let path = std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_NAME));
        if !path.exists() {
            debug!(path = %path.display(), "no dataset config found; using default roots");
            return Ok(Self::default());
        }
        let roots = Self::from_path(&path)?;
        roots.warn_if_missing();
        Ok(roots)
    }

    pub fn from_path(path: &Path) -> DatasetResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| PatchDatasetError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let file: DatasetRootsFile = toml::from_str(&raw).map_err(|e| PatchDatasetError::Toml {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self::from_file(file))
    }

    fn from_file(file: DatasetRootsFile) -> Self {
        let data_root = file
            .data_root
            .map(|v| expand_path(&v))
            .unwrap_or_else(|| PathBuf::from("datasets"));
        let defaults = Self::under(data_root);
        let pick = |value: Option<String>, default: PathBuf| -> PathBuf {
            value.map(|v| expand_path(&v)).unwrap_or(default)
        };
        let gastric = file.gastric.unwrap_or_default();
        let cohort = |section: Option<CohortSection>, default: GastricCohort| -> GastricCohort {
            let section = section.unwrap_or_default();
            GastricCohort {
                split_csv: pick(section.split_csv, default.split_csv),
                train_root: pick(section.train_root, default.train_root),
                eval_root: pick(section.eval_root, default.eval_root),
            }
        };

        DatasetRoots {
            colon: pick(file.colon, defaults.colon),
            colon_test2: pick(file.colon_test2, defaults.colon_test2),
            prostate_uhu: pick(file.prostate_uhu, defaults.prostate_uhu),
            prostate_ubc: pick(file.prostate_ubc, defaults.prostate_ubc),
            prostate_aggc: pick(file.prostate_aggc, defaults.prostate_aggc),
            gastric_her01: cohort(gastric.her01, defaults.gastric_her01),
            gastric_addition: cohort(gastric.addition, defaults.gastric_addition),
            k19: pick(file.k19, defaults.k19),
            k19_split: pick(file.k19_split, defaults.k19_split),
            k16: pick(file.k16, defaults.k16),
            kidney: pick(file.kidney, defaults.kidney),
            liver: pick(file.liver, defaults.liver),
            bladder: pick(file.bladder, defaults.bladder),
            breakhis_images: pick(file.breakhis_images, defaults.breakhis_images),
            breakhis_split: file
                .breakhis_split
                .map(|v| expand_path(&v).to_string_lossy().into_owned())
                .unwrap_or(defaults.breakhis_split),
            data_root: defaults.data_root,
        }
    }

    pub fn breakhis_split_for(&self, fold: u32) -> PathBuf {
        PathBuf::from(self.breakhis_split.replace("{fold}", &fold.to_string()))
    }

    fn warn_if_missing(&self) {
        if !self.data_root.exists() {
            warn!(
                data_root = %self.data_root.display(),
                "dataset config: data_root does not exist; default roots will enumerate nothing"
            );
        }
    }
}

fn expand_path(raw: &str) -> PathBuf {
    let mut out = raw.to_string();
    if let Some(stripped) = out.strip_prefix('~') {
        if let Ok(home) = std::env::var("HOME") {
            out = format!("{home}{stripped}");
        }
    }
    PathBuf::from(expand_env(&out))
}

fn expand_env(input: &str) -> String {
    let mut out = String::new();
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let key = &after[..end];
                match std::env::var(key) {
                    Ok(val) => out.push_str(&val),
                    Err(_) => out.push_str(&format!("${{{key}}}")),
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
