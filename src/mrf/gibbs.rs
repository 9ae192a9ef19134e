//! `GibbsSampler`: approximate MRF inference via single-site sweeps (§4.7).

use rand::Rng;

use crate::config::{InferenceConfig, GIBBS_BURN_IN, GIBBS_SWEEPS};

/// Visit order for one sweep over a `width x height` grid: four corners,
/// left edge, right edge, top edge, bottom edge (each excluding corners),
/// then interior rows in raster order.
fn visit_order(width: usize, height: usize) -> Vec<(usize, usize)> {
    let mut order = Vec::with_capacity(width * height);
    order.push((0, 0));
    order.push((width - 1, 0));
    order.push((0, height - 1));
    order.push((width - 1, height - 1));

    for y in 1..height - 1 {
        order.push((0, y));
    }
    for y in 1..height - 1 {
        order.push((width - 1, y));
    }
    for x in 1..width - 1 {
        order.push((x, 0));
    }
    for x in 1..width - 1 {
        order.push((x, height - 1));
    }
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            order.push((x, y));
        }
    }
    order
}

#[inline]
fn index(width: usize, x: usize, y: usize) -> usize {
    y * width + x
}

/// 4-connected neighbors of `(x, y)` that lie inside `width x height`.
fn neighbors(width: usize, height: usize, x: usize, y: usize) -> [Option<(usize, usize)>; 4] {
    let left = if x > 0 { Some((x - 1, y)) } else { None };
    let right = if x + 1 < width { Some((x + 1, y)) } else { None };
    let up = if y > 0 { Some((x, y - 1)) } else { None };
    let down = if y + 1 < height { Some((x, y + 1)) } else { None };
    [left, right, up, down]
}

/// Run the Gibbs sampler over a clamped unary foreground-probability field
/// (row-major, `width x height`), returning the `count_ones` accumulator
/// after `GIBBS_SWEEPS` post-burn-in sweeps.
pub fn run_gibbs(unary_fg: &[f64], width: usize, height: usize, config: &InferenceConfig, rng: &mut impl Rng) -> Vec<u32> {
    let n = width * height;
    let w = config.pairwise_factor();

    let mut y_grid: Vec<u8> = (0..n).map(|_| if rng.gen_bool(0.5) { 1 } else { 0 }).collect();
    let mut count_ones = vec![0u32; n];
    let order = visit_order(width, height);

    for sweep in 0..(GIBBS_SWEEPS + GIBBS_BURN_IN) {
        for &(x, y) in &order {
            let idx = index(width, x, y);
            let p = unary_fg[idx];

            let mut a = p;
            let mut b = 1.0 - p;
            for neighbor in neighbors(width, height, x, y).into_iter().flatten() {
                let ny = y_grid[index(width, neighbor.0, neighbor.1)];
                if ny == 1 {
                    a *= w;
                } else {
                    b *= w;
                }
            }

            let p_zero = a / (a + b);
            let u: f64 = rng.gen_range(0.0..1.0);
            y_grid[idx] = if u > p_zero { 1 } else { 0 };
        }

        if sweep >= GIBBS_BURN_IN {
            for i in 0..n {
                count_ones[i] += y_grid[i] as u32;
            }
        }
    }

    count_ones
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn visit_order_covers_every_site_once() {
        let order = visit_order(4, 3);
        assert_eq!(order.len(), 12);
        let mut seen = vec![false; 12];
        for (x, y) in order {
            seen[y * 4 + x] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn strong_unary_dominates_weak_pairwise() {
        let width = 3;
        let height = 3;
        let unary = vec![0.99; width * height];
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let config = InferenceConfig { pairwise_energy: 0.01, method: crate::config::InferenceMethod::Gibbs };
        let counts = run_gibbs(&unary, width, height, &config, &mut rng);
        let n = crate::config::GIBBS_SWEEPS;
        for c in counts {
            assert!(c as f64 / n as f64 > 0.8);
        }
    }
}
