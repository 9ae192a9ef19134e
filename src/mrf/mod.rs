//! MRF construction and inference orchestration (§4.6, §4.7): builds a
//! `UnaryField` from forest inference, then hands it to either the
//! graph-cut solver or the Gibbs sampler to produce the final label image.

pub mod gibbs;
pub mod maxflow;

use crate::config::{InferenceConfig, InferenceMethod};
use crate::forest::Forest;
use crate::image::GrayImage;
use crate::sample::{InsideRegion, PaletteColors};

/// Per-pixel clamped foreground probabilities over an image's inside
/// region, indexed row-major as `i = (y - r) * width + (x - r)` (§3
/// "MRFGraph").
pub struct UnaryField {
    pub region: InsideRegion,
    pub width: usize,
    pub height: usize,
    pub probs: Vec<f64>,
}

const P_MIN: f64 = 0.0001;
const P_MAX: f64 = 0.9999;

impl UnaryField {
    /// Forward-pass the forest over every pixel in the image's inside
    /// region, clamping each probability to `[0.0001, 0.9999]` for
    /// numerical stability in the log-transform (§4.6).
    pub fn build(forest: &Forest, image: &GrayImage) -> crate::error::Result<UnaryField> {
        let radius = forest.window_radius();
        let region = InsideRegion::new(image.width(), image.height(), radius)?;
        let width = (region.x1 - region.x0) as usize;
        let height = (region.y1 - region.y0) as usize;
        let mut probs = Vec::with_capacity(width * height);

        for y in region.y0..region.y1 {
            for x in region.x0..region.x1 {
                let p = forest.infer_pixel(image, x, y).clamp(P_MIN, P_MAX);
                probs.push(p);
            }
        }

        Ok(UnaryField { region, width, height, probs })
    }

    /// A grayscale visualization of the field scaled to `[0, 255]`, written
    /// out as the optional `intermediate_path` image (§6).
    pub fn to_intensity_image(&self, full_width: u32, full_height: u32) -> GrayImage {
        let mut out = GrayImage::fill(full_width, full_height, 0);
        for local_y in 0..self.height {
            for local_x in 0..self.width {
                let p = self.probs[local_y * self.width + local_x];
                let x = self.region.x0 + local_x as u32;
                let y = self.region.y0 + local_y as u32;
                out.set(x, y, (p * 255.0).round() as u8);
            }
        }
        out
    }
}

/// Run either graph-cut or Gibbs inference over `unary`, producing a
/// full-size label image. Pixels outside the inside region (the border
/// never classified) are filled with `background_color`, matching the
/// convention that only the inside region carries a prediction.
pub fn infer_labels(
    unary: &UnaryField,
    config: &InferenceConfig,
    palette: PaletteColors,
    full_width: u32,
    full_height: u32,
) -> GrayImage {
    let source_side = match config.method {
        InferenceMethod::MaxFlow => run_maxflow(unary, config.pairwise_energy),
        InferenceMethod::Gibbs => run_gibbs_labels(unary, config),
    };

    let mut out = GrayImage::fill(full_width, full_height, palette.background);
    for local_y in 0..unary.height {
        for local_x in 0..unary.width {
            let i = local_y * unary.width + local_x;
            let x = unary.region.x0 + local_x as u32;
            let y = unary.region.y0 + local_y as u32;
            // source side = background (§4.6 "the convention here follows the source").
            let color = if source_side[i] { palette.background } else { palette.foreground };
            out.set(x, y, color);
        }
    }
    out
}

/// Returns, for each inside-region pixel, whether it falls on the min
/// cut's source side (true = background, per §4.6).
fn run_maxflow(unary: &UnaryField, pairwise_energy: f64) -> Vec<bool> {
    let n = unary.width * unary.height;
    let mut net = maxflow::FlowNetwork::new(n);

    for y in 0..unary.height {
        for x in 0..unary.width {
            let i = y * unary.width + x;
            let p = unary.probs[i];
            net.set_terminal_weights(i, -p.ln(), -(1.0 - p).ln());
            if x + 1 < unary.width {
                net.add_undirected_edge(i, y * unary.width + x + 1, pairwise_energy);
            }
            if y + 1 < unary.height {
                net.add_undirected_edge(i, (y + 1) * unary.width + x, pairwise_energy);
            }
        }
    }

    net.max_flow_min_cut()
}

/// Runs the Gibbs sampler and applies the §4.7/§9 final-assignment rule:
/// `count_ones > N/2` maps to `background_color` (source side = true here
/// too, so the two paths share `infer_labels`'s assembly code). The
/// polarity is preserved exactly as specified, not "fixed".
fn run_gibbs_labels(unary: &UnaryField, config: &InferenceConfig) -> Vec<bool> {
    let mut rng = rand::thread_rng();
    let counts = gibbs::run_gibbs(&unary.probs, unary.width, unary.height, config, &mut rng);
    let half = crate::config::GIBBS_SWEEPS / 2;
    counts.into_iter().map(|c| c > half).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_pairwise_energy_equals_unary_map() {
        // independent unaries, no coupling: source side should follow the
        // per-pixel MAP directly (§8 boundary behavior).
        let unary = UnaryField {
            region: InsideRegion { x0: 0, x1: 2, y0: 0, y1: 1 },
            width: 2,
            height: 1,
            probs: vec![0.9, 0.1],
        };
        let source_side = run_maxflow(&unary, 0.0);
        // pixel 0: p=0.9 foreground-favored -> sink side (false); pixel 1:
        // p=0.1 background-favored -> source side (true).
        assert!(!source_side[0]);
        assert!(source_side[1]);
    }
}
