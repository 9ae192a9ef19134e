//! End-to-end scenarios from §8: identity, noise robustness, and graph-cut
//! monotonicity, run against the public `train`/`infer` entry points.

use lakaseg::{InferenceConfig, InferenceMethod, TrainingConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn write_gray(path: &std::path::Path, width: u32, height: u32, pixels: &[u8]) {
    image::GrayImage::from_raw(width, height, pixels.to_vec())
        .unwrap()
        .save(path)
        .unwrap();
}

/// Left half 50, right half 200.
fn half_split_image(width: u32, height: u32) -> Vec<u8> {
    let mut pixels = vec![0u8; (width * height) as usize];
    for y in 0..height {
        for x in 0..width {
            pixels[(y * width + x) as usize] = if x < width / 2 { 50 } else { 200 };
        }
    }
    pixels
}

#[test]
fn identity_recovers_clean_half_split_label() {
    let dir = tempfile::tempdir().unwrap();
    let train_path = dir.path().join("train.png");
    let label_path = dir.path().join("label.png");
    let forest_path = dir.path().join("forest.json");
    let out_path = dir.path().join("out.png");

    let pixels = half_split_image(32, 32);
    write_gray(&train_path, 32, 32, &pixels);
    write_gray(&label_path, 32, 32, &pixels);

    let config = TrainingConfig {
        forest_size: 4,
        max_tree_depth: 4,
        testobject_tries: 50,
        window_radius: 3,
        thread_count: 1,
        seed: Some(42),
    };
    lakaseg::train(&[train_path.clone()], &[label_path.clone()], &forest_path, &config).unwrap();

    let inference_config = InferenceConfig {
        pairwise_energy: 1.0,
        method: InferenceMethod::MaxFlow,
    };
    lakaseg::infer(&train_path, &forest_path, &out_path, &inference_config, None, None).unwrap();

    let output = lakaseg::GrayImage::load(&out_path).unwrap();
    let label = lakaseg::GrayImage::load(&label_path).unwrap();
    let r = 3;
    for y in r..32 - r {
        for x in r..32 - r {
            assert_eq!(output.get(x, y), label.get(x, y), "mismatch at ({x},{y})");
        }
    }

    let forest = lakaseg::forest::Forest::load(&forest_path).unwrap();
    for tree in &forest.trees {
        assert!(
            tree.max_leaf_depth() <= config.max_tree_depth,
            "leaf depth {} exceeds max_tree_depth {}",
            tree.max_leaf_depth(),
            config.max_tree_depth
        );
    }
}

#[test]
fn noise_robustness_stays_within_one_percent() {
    let dir = tempfile::tempdir().unwrap();
    let train_path = dir.path().join("train.png");
    let label_path = dir.path().join("label.png");
    let noisy_path = dir.path().join("noisy.png");
    let forest_path = dir.path().join("forest.json");
    let out_path = dir.path().join("out.png");

    let clean = half_split_image(32, 32);
    write_gray(&train_path, 32, 32, &clean);
    write_gray(&label_path, 32, 32, &clean);

    let mut rng = StdRng::seed_from_u64(7);
    let mut noisy = clean.clone();
    for p in noisy.iter_mut() {
        if rng.gen_bool(0.10) {
            *p = if rng.gen_bool(0.5) { 0 } else { 255 };
        }
    }
    write_gray(&noisy_path, 32, 32, &noisy);

    let config = TrainingConfig {
        forest_size: 6,
        max_tree_depth: 5,
        testobject_tries: 80,
        window_radius: 3,
        thread_count: 1,
        seed: Some(11),
    };
    lakaseg::train(&[train_path], &[label_path.clone()], &forest_path, &config).unwrap();

    let inference_config = InferenceConfig {
        pairwise_energy: 10.0,
        method: InferenceMethod::MaxFlow,
    };
    lakaseg::infer(&noisy_path, &forest_path, &out_path, &inference_config, None, None).unwrap();

    let output = lakaseg::GrayImage::load(&out_path).unwrap();
    let label = lakaseg::GrayImage::load(&label_path).unwrap();
    let r = 3;
    let mut total = 0u32;
    let mut wrong = 0u32;
    for y in r..32 - r {
        for x in r..32 - r {
            total += 1;
            if output.get(x, y) != label.get(x, y) {
                wrong += 1;
            }
        }
    }
    assert!(
        (wrong as f64 / total as f64) <= 0.01,
        "too many mismatches: {wrong}/{total}"
    );
}

#[test]
fn boundary_image_has_single_pixel_inside_region() {
    let dir = tempfile::tempdir().unwrap();
    let train_path = dir.path().join("train.png");
    let label_path = dir.path().join("label.png");
    let forest_path = dir.path().join("forest.json");
    let out_path = dir.path().join("out.png");

    // r = 2 -> (2r+1) x (2r+1) = 5x5, inside region is the single center pixel.
    let size = 5u32;
    let mut pixels = vec![50u8; (size * size) as usize];
    pixels[(2 * size + 2) as usize] = 200;
    write_gray(&train_path, size, size, &pixels);
    write_gray(&label_path, size, size, &pixels);

    let config = TrainingConfig {
        forest_size: 2,
        max_tree_depth: 2,
        testobject_tries: 20,
        window_radius: 2,
        thread_count: 1,
        seed: Some(1),
    };
    lakaseg::train(&[train_path.clone()], &[label_path], &forest_path, &config).unwrap();

    let inference_config = InferenceConfig {
        pairwise_energy: 1.0,
        method: InferenceMethod::MaxFlow,
    };
    lakaseg::infer(&train_path, &forest_path, &out_path, &inference_config, None, None).unwrap();

    let output = lakaseg::GrayImage::load(&out_path).unwrap();
    assert_eq!(output.width(), size);
    assert_eq!(output.height(), size);
}

#[test]
fn zero_pairwise_energy_matches_per_pixel_map() {
    use lakaseg::forest::Forest;
    use lakaseg::mrf::UnaryField;

    let dir = tempfile::tempdir().unwrap();
    let train_path = dir.path().join("train.png");
    let label_path = dir.path().join("label.png");
    let forest_path = dir.path().join("forest.json");

    let pixels = half_split_image(24, 24);
    write_gray(&train_path, 24, 24, &pixels);
    write_gray(&label_path, 24, 24, &pixels);

    let config = TrainingConfig {
        forest_size: 4,
        max_tree_depth: 4,
        testobject_tries: 40,
        window_radius: 3,
        thread_count: 1,
        seed: Some(5),
    };
    lakaseg::train(&[train_path.clone()], &[label_path], &forest_path, &config).unwrap();

    let forest = Forest::load(&forest_path).unwrap();
    let image = lakaseg::GrayImage::load(&train_path).unwrap();
    let unary = UnaryField::build(&forest, &image).unwrap();

    let out = lakaseg::mrf::infer_labels(
        &unary,
        &InferenceConfig { pairwise_energy: 0.0, method: InferenceMethod::MaxFlow },
        forest.palette,
        image.width(),
        image.height(),
    );

    let r = 3;
    for y in r..24 - r {
        for x in r..24 - r {
            let p = forest.infer_pixel(&image, x, y);
            let expected = if p >= 0.5 { forest.palette.foreground } else { forest.palette.background };
            assert_eq!(out.get(x, y), expected, "mismatch at ({x},{y}), p={p}");
        }
    }
}

#[test]
fn increasing_pairwise_energy_does_not_increase_label_changes() {
    use lakaseg::forest::Forest;
    use lakaseg::mrf::UnaryField;

    let dir = tempfile::tempdir().unwrap();
    let train_path = dir.path().join("train.png");
    let label_path = dir.path().join("label.png");
    let forest_path = dir.path().join("forest.json");

    let mut rng = StdRng::seed_from_u64(3);
    let mut pixels = half_split_image(24, 24);
    for p in pixels.iter_mut() {
        if rng.gen_bool(0.15) {
            *p = if rng.gen_bool(0.5) { 0 } else { 255 };
        }
    }
    write_gray(&train_path, 24, 24, &pixels);
    write_gray(&label_path, 24, 24, &half_split_image(24, 24));

    let config = TrainingConfig {
        forest_size: 4,
        max_tree_depth: 4,
        testobject_tries: 40,
        window_radius: 3,
        thread_count: 1,
        seed: Some(9),
    };
    lakaseg::train(&[train_path.clone()], &[label_path], &forest_path, &config).unwrap();

    let forest = Forest::load(&forest_path).unwrap();
    let image = lakaseg::GrayImage::load(&train_path).unwrap();
    let unary = UnaryField::build(&forest, &image).unwrap();

    let count_changes = |energy: f64| -> u32 {
        let out = lakaseg::mrf::infer_labels(
            &unary,
            &InferenceConfig { pairwise_energy: energy, method: InferenceMethod::MaxFlow },
            forest.palette,
            image.width(),
            image.height(),
        );
        let r = 3;
        let mut changes = 0;
        for y in r..24 - r {
            for x in r..24 - r - 1 {
                if out.get(x, y) != out.get(x + 1, y) {
                    changes += 1;
                }
            }
        }
        changes
    };

    let low = count_changes(0.1);
    let mid = count_changes(5.0);
    let high = count_changes(50.0);
    assert!(mid <= low, "{mid} > {low}");
    assert!(high <= mid, "{high} > {mid}");
}
