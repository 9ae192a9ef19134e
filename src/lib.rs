//! Binary foreground/background image segmentation: randomized decision
//! forests for per-pixel classification, refined by a 4-connected MRF
//! solved either exactly (graph-cut) or approximately (Gibbs sampling).

pub mod config;
pub mod error;
pub mod forest;
pub mod image;
pub mod mrf;
pub mod sample;
pub mod split;
pub mod tree;

use std::path::{Path, PathBuf};

use log::info;

pub use config::{InferenceConfig, InferenceMethod, TrainingConfig};
pub use error::{Result, SegError};
pub use forest::Forest;
pub use self::image::GrayImage;

/// Train a forest from paired training/label images and write it to
/// `output_forest_path` (§6 "Library entry points").
pub fn train(
    training_images: &[PathBuf],
    label_images: &[PathBuf],
    output_forest_path: impl AsRef<Path>,
    config: &TrainingConfig,
) -> Result<()> {
    self::image::check_image_counts(training_images, label_images)?;
    let pairs: Vec<(PathBuf, PathBuf)> = training_images
        .iter()
        .cloned()
        .zip(label_images.iter().cloned())
        .collect();

    info!(
        "training a forest of {} trees from {} image pairs",
        config.forest_size,
        pairs.len()
    );
    let forest = Forest::train(&pairs, config)?;
    forest.save(&output_forest_path)?;
    info!("wrote forest to {:?}", output_forest_path.as_ref());
    Ok(())
}

/// Run inference on a single input image against a previously trained
/// forest, writing the final label image and, optionally, the
/// unary-probability visualization and an `ergebnisse.txt` accuracy report
/// (§6).
#[allow(clippy::too_many_arguments)]
pub fn infer(
    input_image_path: impl AsRef<Path>,
    forest_path: impl AsRef<Path>,
    output_label_path: impl AsRef<Path>,
    inference_config: &InferenceConfig,
    intermediate_path: Option<&Path>,
    ground_truth_path: Option<&Path>,
) -> Result<()> {
    let forest = Forest::load(&forest_path)?;
    let input = GrayImage::load(&input_image_path)?;

    let unary = mrf::UnaryField::build(&forest, &input)?;

    if let Some(path) = intermediate_path {
        let intensity = unary.to_intensity_image(input.width(), input.height());
        intensity.save(path)?;
        info!("wrote intermediate probability field to {path:?}");
    }

    let output = mrf::infer_labels(&unary, inference_config, forest.palette, input.width(), input.height());
    output.save(&output_label_path)?;
    info!("wrote label image to {:?}", output_label_path.as_ref());

    if let Some(gt_path) = ground_truth_path {
        let ground_truth = GrayImage::load(gt_path)?;
        let (labeled, correct) = score_against_ground_truth(&output, &ground_truth, unary.region);
        std::fs::write("ergebnisse.txt", format!("({labeled}, {correct})\n"))?;
        info!("wrote ergebnisse.txt: ({labeled}, {correct})");
    }

    Ok(())
}

/// Count of inside-region pixels with a nonzero ground-truth label
/// (`labeled`) and of those whose output label matches the ground-truth
/// pixel value exactly (`correct`). Unlabeled (0) ground-truth pixels are
/// skipped entirely, matching `print_result_statistics`'s contract.
fn score_against_ground_truth(output: &GrayImage, ground_truth: &GrayImage, region: sample::InsideRegion) -> (u64, u64) {
    let mut labeled = 0u64;
    let mut correct = 0u64;
    for y in region.y0..region.y1 {
        for x in region.x0..region.x1 {
            if x >= ground_truth.width() || y >= ground_truth.height() {
                continue;
            }
            let gt = ground_truth.get(x, y);
            if gt == 0 {
                continue;
            }
            labeled += 1;
            if output.get(x, y) == gt {
                correct += 1;
            }
        }
    }
    (labeled, correct)
}
