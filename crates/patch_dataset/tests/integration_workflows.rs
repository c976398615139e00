//! Integration tests for end-to-end patch_dataset workflows.
//!
//! These tests lay out small synthetic dataset trees and verify:
//! 1. Directory conventions → splits (disjointness, proportions, listings)
//! 2. Labels → captions that belong to the dataset's caption list
//! 3. Gastric benign downsampling
//! 4. Splits → samples → batches

use image::{Rgb, RgbImage};
use patch_dataset::{
    build_loaders, combine_hard_prompt_with_label, get_caption, prepare_dataset, DatasetKind,
    DatasetRoots, DatasetSplits, Label, LabelMode, PatchDataset, PatchDatasetError,
    PrepareOptions, RunType, SampleConfig, NO_HARD_PROMPT,
};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Create an empty file (and its parents). Split assembly never decodes.
fn touch(root: &Path, rel: &str) -> anyhow::Result<PathBuf> {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, b"")?;
    Ok(path)
}

/// Write a real image so the sample provider can decode it.
fn write_image(root: &Path, rel: &str, shade: u8) -> anyhow::Result<PathBuf> {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let img = RgbImage::from_fn(32, 24, |x, y| {
        Rgb([shade, (x * 7) as u8, (y * 9) as u8])
    });
    img.save(&path)?;
    Ok(path)
}

fn all_labels(splits: &DatasetSplits) -> impl Iterator<Item = &Label> {
    splits
        .train
        .iter()
        .chain(&splits.valid)
        .chain(&splits.test)
        .map(|s| &s.label)
}

fn assert_captions_are_canonical(kind: DatasetKind, splits: &DatasetSplits) -> anyhow::Result<()> {
    let canonical = get_caption(kind.as_str(), LabelMode::Caption)?;
    for label in all_labels(splits) {
        let text = label
            .as_caption()
            .ok_or_else(|| anyhow::anyhow!("{kind}: expected a caption, got {label}"))?;
        let caption = combine_hard_prompt_with_label(kind.hard_prompt(), text);
        assert!(
            canonical.contains_caption(&caption),
            "{kind}: {caption:?} not in caption list"
        );
    }
    Ok(())
}

fn prepare(kind: DatasetKind, roots: &DatasetRoots, mode: LabelMode) -> anyhow::Result<DatasetSplits> {
    Ok(prepare_dataset(kind, roots, mode, &PrepareOptions::default())?)
}

fn colon_fixture(data_root: &Path) -> anyhow::Result<()> {
    let colon = data_root.join("KBSMC_512");
    for dir in [
        "tma_01", "tma_02", "tma_03", "tma_04", "tma_05", "tma_06", "wsi_01", "wsi_02", "wsi_03",
    ] {
        for (i, grade) in [0, 2].into_iter().enumerate() {
            touch(&colon, &format!("{dir}/{dir}_patch_{i}_{grade}.jpg"))?;
        }
    }
    // Deeper files and other extensions are not part of the convention.
    touch(&colon, "tma_01/nested/x_1.jpg")?;
    touch(&colon, "tma_01/readme.txt")?;
    Ok(())
}

#[test]
fn workflow_colon_splits_are_disjoint_and_canonical() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    colon_fixture(tmp.path())?;
    let roots = DatasetRoots::under(tmp.path().to_path_buf());

    let splits = prepare(DatasetKind::Colon1, &roots, LabelMode::Caption)?;
    assert_eq!(splits.summary().train, 10);
    assert_eq!(splits.summary().valid, 4);
    assert_eq!(splits.summary().test, 4);

    let train: HashSet<_> = splits.train.iter().map(|s| &s.path).collect();
    let valid: HashSet<_> = splits.valid.iter().map(|s| &s.path).collect();
    let test: HashSet<_> = splits.test.iter().map(|s| &s.path).collect();
    assert!(train.is_disjoint(&valid));
    assert!(train.is_disjoint(&test));
    assert!(valid.is_disjoint(&test));
    assert!(splits
        .test
        .iter()
        .all(|s| s.path.to_string_lossy().contains("tma_04") || s.path.to_string_lossy().contains("wsi_02")));

    assert_captions_are_canonical(DatasetKind::Colon1, &splits)?;

    let indexed = prepare(DatasetKind::Colon1, &roots, LabelMode::ClassIndex)?;
    let ids: HashSet<_> = all_labels(&indexed).filter_map(Label::as_class).collect();
    assert_eq!(ids, HashSet::from([0, 2]));
    Ok(())
}

#[test]
fn workflow_preparation_is_deterministic() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    colon_fixture(tmp.path())?;
    let roots = DatasetRoots::under(tmp.path().to_path_buf());
    let a = prepare(DatasetKind::Colon1, &roots, LabelMode::Caption)?;
    let b = prepare(DatasetKind::Colon1, &roots, LabelMode::Caption)?;
    assert_eq!(a, b);
    Ok(())
}

/// UBC layout: one slide directory level, suffix codes 0, 2, 3, 4.
fn prostate_ubc_fixture(data_root: &Path) -> anyhow::Result<PathBuf> {
    let ubc = data_root.join("prostate_miccai_2019_patches_690_80_step05_test");
    touch(&ubc, "slide1/slide1_0_0.jpg")?;
    touch(&ubc, "slide1/slide1_1_2.jpg")?;
    touch(&ubc, "slide2/slide2_0_3.jpg")?;
    touch(&ubc, "slide2/slide2_1_4.jpg")?;
    // Too deep for `*/*.jpg`.
    touch(&ubc, "slide2/tiles/slide2_2_2.jpg")?;
    Ok(ubc)
}

/// AGGC layout: Subset1/2 are two levels deep, Subset3 three. Grades 0 and 1
/// are present and must be dropped.
fn prostate_aggc_fixture(data_root: &Path) -> anyhow::Result<PathBuf> {
    let aggc = data_root.join("AGGC22_patch_512_c08");
    touch(&aggc, "Subset1_Train_image/s1/s1_a_2.png")?;
    touch(&aggc, "Subset1_Train_image/s1/s1_b_0.png")?;
    touch(&aggc, "Subset2_Train_image/s2/s2_a_4.png")?;
    touch(&aggc, "Subset2_Train_image/s2/s2_b_1.png")?;
    touch(&aggc, "Subset3_Train_image/akoya/s3/s3_a_5.png")?;
    touch(&aggc, "Subset3_Train_image/akoya/s3/s3_b_1.png")?;
    // Subset3 patches sit one level deeper than this.
    touch(&aggc, "Subset3_Train_image/s3/s3_shallow_3.png")?;
    Ok(aggc)
}

#[test]
fn workflow_prostate_ubc_and_aggc_layouts() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let ubc = prostate_ubc_fixture(tmp.path())?;
    let aggc = prostate_aggc_fixture(tmp.path())?;
    let roots = DatasetRoots::under(tmp.path().to_path_buf());

    let ubc_splits = prepare(DatasetKind::Prostate2, &roots, LabelMode::ClassIndex)?;
    assert!(ubc_splits.train.is_empty() && ubc_splits.valid.is_empty());
    assert_eq!(
        ubc_splits.test.iter().map(|s| s.path.clone()).collect::<Vec<_>>(),
        vec![
            ubc.join("slide1/slide1_0_0.jpg"),
            ubc.join("slide1/slide1_1_2.jpg"),
            ubc.join("slide2/slide2_0_3.jpg"),
            ubc.join("slide2/slide2_1_4.jpg"),
        ]
    );
    // Codes {0, 2, 3, 4} collapse onto contiguous ids.
    assert_eq!(
        ubc_splits.test.iter().map(|s| s.label.clone()).collect::<Vec<_>>(),
        vec![Label::Class(0), Label::Class(1), Label::Class(2), Label::Class(3)]
    );
    let combined = prepare(DatasetKind::Prostate2, &roots, LabelMode::CombineDataset)?;
    assert_eq!(
        combined.test.iter().map(|s| s.label.clone()).collect::<Vec<_>>(),
        vec![Label::Class(0), Label::Class(4), Label::Class(5), Label::Class(6)]
    );

    let aggc_splits = prepare(DatasetKind::Prostate3, &roots, LabelMode::ClassIndex)?;
    assert!(aggc_splits.valid.is_empty() && aggc_splits.test.is_empty());
    assert_eq!(
        aggc_splits.train.iter().map(|s| s.path.clone()).collect::<Vec<_>>(),
        vec![
            aggc.join("Subset1_Train_image/s1/s1_a_2.png"),
            aggc.join("Subset2_Train_image/s2/s2_a_4.png"),
            aggc.join("Subset3_Train_image/akoya/s3/s3_a_5.png"),
        ]
    );
    assert_eq!(
        aggc_splits.train.iter().map(|s| s.label.clone()).collect::<Vec<_>>(),
        vec![Label::Class(0), Label::Class(2), Label::Class(3)]
    );

    let captions = prepare(DatasetKind::Prostate3, &roots, LabelMode::Caption)?;
    assert_eq!(
        captions
            .train
            .iter()
            .filter_map(|s| s.label.as_caption())
            .collect::<Vec<_>>(),
        vec!["benign.", "grade 4 cancer.", "grade 5 cancer."]
    );
    Ok(())
}

#[test]
fn workflow_captions_belong_to_caption_lists() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let root = tmp.path();

    let uhu = root.join("prostate_harvard");
    touch(&uhu, "patches_train_750_v0/ZT111_4_A/ZT111_4_A_1_2_0.jpg")?;
    touch(&uhu, "patches_train_750_v0/ZT199_1_B/ZT199_1_B_3_4_3.jpg")?;
    touch(&uhu, "patches_train_750_v0/ZT8_1_A/ZT8_1_A_1_1_1.jpg")?;
    touch(&uhu, "patches_validation_750_v0/ZT76_39_A/ZT76_39_A_1_1_1.jpg")?;
    touch(&uhu, "patches_test_750_v0/patho_1/ZT80_38_A/ZT80_38_A_2_2_2.jpg")?;

    let kidney = root.join("kidney_grading");
    touch(&kidney, "Training/grade0/a.png")?;
    touch(&kidney, "Validation/grade4/b.png")?;
    touch(&kidney, "Test/grade2/c.png")?;

    let liver = root.join("liver_grading");
    touch(&liver, "Training/class3/a.png")?;
    touch(&liver, "Test/class0/b.png")?;

    let bladder = root.join("prosessed_bladder_data_1024_2");
    touch(&bladder, "train/case1/grade1/a.png")?;
    touch(&bladder, "val/case2/grade3/b.png")?;
    touch(&bladder, "test/case3/grade2/c.png")?;

    let colon2 = root.join("KBSMC_512_test2/KBSMC_test_2");
    touch(&colon2, "wsi_001/0/wsi_001_0_1.png")?;
    touch(&colon2, "wsi_090/3/wsi_090_3_4.png")?;
    touch(&colon2, "wsi_091/3/wsi_091_3_2.png")?;

    prostate_ubc_fixture(root)?;
    prostate_aggc_fixture(root)?;

    let k19 = root.join("NCT-CRC-HE-100K");
    fs::create_dir_all(&k19)?;
    fs::write(
        root.join("K19_9class_split.json"),
        r#"{"train_set": [["ADI/ADI-1.tif", 0], ["MUC/MUC-1.tif", 4]],
            "valid_set": [["MUS/MUS-1.tif", 5]],
            "test_set": [["TUM/TUM-1.tif", 8]]}"#,
    )?;

    let roots = DatasetRoots::under(root.to_path_buf());
    for kind in [
        DatasetKind::Prostate1,
        DatasetKind::Prostate2,
        DatasetKind::Prostate3,
        DatasetKind::Kidney,
        DatasetKind::Liver,
        DatasetKind::Bladder,
        DatasetKind::Colon2,
        DatasetKind::K19,
    ] {
        let splits = prepare(kind, &roots, LabelMode::Caption)?;
        assert!(!splits.is_empty(), "{kind} fixture produced nothing");
        assert_captions_are_canonical(kind, &splits)?;
    }

    let prostate = prepare(DatasetKind::Prostate1, &roots, LabelMode::Caption)?;
    assert_eq!(prostate.summary().train, 2, "ZT8 is not a train slide");
    let colon2 = prepare(DatasetKind::Colon2, &roots, LabelMode::ClassIndex)?;
    assert_eq!(colon2.summary().test, 2, "wsi_091 is not listed");
    assert_eq!(
        colon2.test.iter().map(|s| s.label.clone()).collect::<Vec<_>>(),
        vec![Label::Class(0), Label::Class(3)]
    );
    let k19_splits = prepare(DatasetKind::K19, &roots, LabelMode::CombineDataset)?;
    assert_eq!(k19_splits.train[1].path, k19.join("MUC/MUC-1.tif"));
    assert_eq!(k19_splits.train[1].label, Label::Class(14));
    Ok(())
}

fn gastric_file(root: &Path, wsi: &str, idx: usize, code: u32) -> anyhow::Result<PathBuf> {
    touch(root, &format!("{wsi}/{wsi}_{idx}_{code}.jpg"))
}

fn gastric_fixture(data_root: &Path) -> anyhow::Result<DatasetRoots> {
    let roots = DatasetRoots::under(data_root.to_path_buf());
    let her = &roots.gastric_her01;
    let add = &roots.gastric_addition;
    fs::create_dir_all(data_root.join("gastric"))?;
    fs::write(
        &her.split_csv,
        "WSI,Task,Note\nW1,train,a\nW2,train,b\nW3,val,c\nW4,test,d\nW5,unused,e\n",
    )?;
    fs::write(&add.split_csv, "WSI,Task\nA1,train\nA2,test\n")?;

    let mut idx = 0;
    let mut next = || {
        idx += 1;
        idx
    };
    for _ in 0..20 {
        gastric_file(&her.train_root, "W1", next(), 1)?;
    }
    for code in [3, 4, 5, 3, 4, 5] {
        gastric_file(&her.train_root, "W1", next(), code)?;
    }
    for code in [6, 11] {
        gastric_file(&her.train_root, "W1", next(), code)?;
    }
    for _ in 0..10 {
        gastric_file(&her.train_root, "W2", next(), 2)?;
    }
    for code in [3, 4, 5] {
        gastric_file(&her.train_root, "W2", next(), code)?;
    }
    gastric_file(&her.eval_root, "W3", next(), 1)?;
    gastric_file(&her.eval_root, "W3", next(), 4)?;
    gastric_file(&her.eval_root, "W4", next(), 5)?;
    gastric_file(&her.eval_root, "W4", next(), 7)?;
    gastric_file(&her.eval_root, "W5", next(), 5)?;
    for _ in 0..4 {
        gastric_file(&add.train_root, "A1", next(), 1)?;
    }
    gastric_file(&add.eval_root, "A2", next(), 3)?;
    Ok(roots)
}

#[test]
fn workflow_gastric_downsamples_first_cohort_benign() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let roots = gastric_fixture(tmp.path())?;
    let opts = PrepareOptions {
        downsample_seed: Some(3),
        ..PrepareOptions::default()
    };

    for mode in [LabelMode::Caption, LabelMode::ClassIndex] {
        let splits = prepare_dataset(DatasetKind::Gastric, &roots, mode, &opts)?;
        let her_train: Vec<_> = splits
            .train
            .iter()
            .filter(|s| s.path.starts_with(&roots.gastric_her01.train_root))
            .collect();
        let is_benign = |label: &Label| match label {
            Label::Caption(text) => text == "benign.",
            Label::Class(id) => *id == 0,
        };
        let benign = her_train.iter().filter(|s| is_benign(&s.label)).count();
        let tumor = her_train.len() - benign;
        assert_eq!(tumor, 9, "{mode:?}: other patches must be filtered");
        assert_eq!(benign, tumor / 3, "{mode:?}");

        // Addition cohort keeps every benign patch.
        assert_eq!(splits.train.len() - her_train.len(), 4);
        assert_eq!(splits.valid.len(), 2);
        assert_eq!(splits.test.len(), 2);

        let again = prepare_dataset(DatasetKind::Gastric, &roots, mode, &opts)?;
        assert_eq!(splits, again, "seeded downsampling is reproducible");
    }

    let captions = prepare(DatasetKind::Gastric, &roots, LabelMode::Caption)?;
    assert_captions_are_canonical(DatasetKind::Gastric, &captions)?;
    Ok(())
}

#[test]
fn workflow_k16_fixed_shuffle_and_proportions() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let k16 = tmp.path().join("Kather_texture_2016_image_tiles_5000");
    for dir in [
        "01_TUMOR", "02_STROMA", "03_COMPLEX", "04_LYMPHO", "05_DEBRIS", "06_MUCOSA",
        "07_ADIPOSE", "08_EMPTY",
    ] {
        for i in 0..10 {
            touch(&k16, &format!("{dir}/{i:03}_{dir}.tif"))?;
        }
    }
    let roots = DatasetRoots::under(tmp.path().to_path_buf());
    let splits = prepare(DatasetKind::K16, &roots, LabelMode::ClassIndex)?;
    assert_eq!(splits.summary().train, 49);
    assert_eq!(splits.summary().valid, 10);
    assert_eq!(splits.summary().test, 11);
    assert!(all_labels(&splits).all(|l| matches!(l, Label::Class(1..=7))));
    let complex = splits
        .train
        .iter()
        .chain(&splits.valid)
        .chain(&splits.test)
        .any(|s| s.path.to_string_lossy().contains("03_COMPLEX"));
    assert!(!complex);

    let again = prepare(DatasetKind::K16, &roots, LabelMode::ClassIndex)?;
    assert_eq!(splits, again);

    let captions = prepare(DatasetKind::K16, &roots, LabelMode::Caption)?;
    let paths = |s: &DatasetSplits| s.train.iter().map(|x| x.path.clone()).collect::<Vec<_>>();
    assert_eq!(paths(&captions), paths(&splits), "label mode does not change the shuffle");
    Ok(())
}

#[test]
fn workflow_breakhis_fold_listing() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let dir = tmp.path().join("breasthis");
    fs::create_dir_all(&dir)?;
    fs::write(
        dir.join("fold1_new.txt"),
        "SOB_B_A-14-22549AB-40-001.png|40|1|train\n\
         SOB_M_DC-14-2523-40-010.png|40|1|test\n\
         SOB_M_PC-14-9146-40-001.png|40|1|train\n\n",
    )?;
    let roots = DatasetRoots::under(tmp.path().to_path_buf());

    let splits = prepare(DatasetKind::Breakhis, &roots, LabelMode::Caption)?;
    assert_eq!(splits.summary().train, 2);
    assert_eq!(splits.summary().valid, 0);
    assert_eq!(splits.summary().test, 1);
    assert_eq!(
        splits.train[0].path,
        roots.breakhis_images.join("SOB_B_A-14-22549AB-40-001.png")
    );
    assert_eq!(
        splits.test[0].label,
        Label::Caption("malignant - ductal carcinoma.".into())
    );

    let ids = prepare(DatasetKind::Breakhis, &roots, LabelMode::ClassIndex)?;
    let ids: Vec<_> = all_labels(&ids).filter_map(Label::as_class).collect();
    assert_eq!(ids, vec![0, 7, 4]);

    let err = prepare_dataset(
        DatasetKind::Breakhis,
        &roots,
        LabelMode::Caption,
        &PrepareOptions {
            breakhis_fold: 2,
            ..PrepareOptions::default()
        },
    )
    .unwrap_err();
    assert!(matches!(err, PatchDatasetError::Io { .. }));
    Ok(())
}

#[test]
fn workflow_roots_from_toml_file() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    colon_fixture(&tmp.path().join("elsewhere"))?;
    let cfg_path = tmp.path().join("patch-dataset.toml");
    fs::write(
        &cfg_path,
        format!(
            "data_root = \"{}\"\ncolon = \"{}\"\n",
            tmp.path().display(),
            tmp.path().join("elsewhere/KBSMC_512").display()
        ),
    )?;
    let roots = DatasetRoots::from_path(&cfg_path)?;
    let splits = prepare(DatasetKind::Colon1, &roots, LabelMode::Caption)?;
    assert_eq!(splits.len(), 18);
    Ok(())
}

fn sample_config(run_type: RunType) -> SampleConfig {
    SampleConfig {
        resize: 16,
        mean: [0.0; 3],
        std: [255.0; 3],
        ..SampleConfig::new(DatasetKind::Colon1, run_type)
    }
}

fn image_fixture(data_root: &Path, count: usize) -> anyhow::Result<Vec<PathBuf>> {
    let colon = data_root.join("KBSMC_512");
    (0..count)
        .map(|i| write_image(&colon, &format!("tma_01/tma_01_{i}_{}.jpg", i % 4), (i * 40) as u8))
        .collect()
}

#[test]
fn workflow_sample_provider_eval_and_train() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    image_fixture(tmp.path(), 3)?;
    let roots = DatasetRoots::under(tmp.path().to_path_buf());
    let splits = prepare(DatasetKind::Colon1, &roots, LabelMode::Caption)?;
    assert_eq!(splits.train.len(), 3);

    let cfg = sample_config(RunType::Prompt);
    let eval = PatchDataset::new(splits.train.clone(), &cfg, false);
    let a = eval.get(2)?;
    let b = eval.get(2)?;
    assert_eq!(a, b, "eval mode is deterministic");
    assert_eq!(a.image_chw.len(), 3 * 16 * 16);
    assert_eq!(a.hard_prompt, "the cancer grading of this colorectal patch is");
    assert_eq!(
        a.target,
        Label::Caption("the cancer grading of this colorectal patch is moderately differentiated.".into())
    );

    let train = PatchDataset::new(splits.train.clone(), &cfg, true);
    for i in 0..train.len() {
        let item = train.get(i)?;
        assert_eq!(item.image_chw.len(), 3 * 16 * 16);
        assert!(item.image_chw.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    let seeded_cfg = SampleConfig {
        seed: Some(99),
        ..cfg.clone()
    };
    let seeded = PatchDataset::new(splits.train.clone(), &seeded_cfg, true);
    assert_eq!(seeded.get(1)?, seeded.get(1)?, "seeded train mode is reproducible");

    let indexed = prepare(DatasetKind::Colon1, &roots, LabelMode::ClassIndex)?;
    let encoder = PatchDataset::new(indexed.train, &sample_config(RunType::SingleEncoder), false);
    let item = encoder.get(1)?;
    assert_eq!(item.hard_prompt, NO_HARD_PROMPT);
    assert_eq!(item.target, Label::Class(1));
    Ok(())
}

#[test]
fn workflow_loaders_batch_and_drop_last() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let paths = image_fixture(tmp.path(), 8)?;
    let roots = DatasetRoots::under(tmp.path().to_path_buf());
    let splits = prepare(DatasetKind::Colon1, &roots, LabelMode::Caption)?;
    let (train_samples, valid_samples) = splits.train.split_at(5);

    let cfg = SampleConfig {
        seed: Some(1),
        ..sample_config(RunType::Prompt)
    };
    let (mut train, mut valid) =
        build_loaders(train_samples.to_vec(), valid_samples.to_vec(), &cfg, 2);
    assert_eq!(train.num_batches(), 2);
    assert_eq!(valid.num_batches(), 2);

    let mut seen = Vec::new();
    while let Some(batch) = train.next_batch()? {
        assert_eq!(batch.shape, [2, 3, 16, 16]);
        assert_eq!(batch.images.len(), 2 * 3 * 16 * 16);
        assert_eq!(batch.prompts.len(), 2);
        seen.extend(batch.paths);
    }
    assert_eq!(seen.len(), 4, "last partial train batch is dropped");

    let mut valid_sizes = Vec::new();
    while let Some(batch) = valid.next_batch()? {
        assert!(batch
            .targets
            .iter()
            .all(|t| t.as_caption().is_some_and(|c| c.starts_with("the cancer grading"))));
        valid_sizes.push(batch.len());
    }
    assert_eq!(valid_sizes, vec![2, 1]);

    train.reset();
    assert_eq!(train.epoch(), 1);
    assert!(train.next_batch()?.is_some());
    assert!(paths.iter().all(|p| p.exists()));
    Ok(())
}
