//! Training-sample selection (§4.1): palette discovery, class-balanced mask
//! construction, and dilation-based hard-negative mining.

use log::{debug, warn};
use rand::Rng;

use crate::config::{BACKGROUND_DRAW_RETRY_LIMIT, DILATION_SIZE};
use crate::error::{Result, SegError};
use crate::image::GrayImage;

/// The pair (background, foreground) palette colors of a label image.
/// Invariant: `foreground > background > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PaletteColors {
    pub background: u8,
    pub foreground: u8,
}

/// A per-pixel label mask: 0 = ignored, 1 = background sample, 2 = foreground
/// sample.
#[derive(Debug, Clone)]
pub struct LabelMask {
    width: u32,
    height: u32,
    values: Vec<u8>,
}

impl LabelMask {
    fn zeros(width: u32, height: u32) -> Self {
        LabelMask {
            width,
            height,
            values: vec![0; (width as usize) * (height as usize)],
        }
    }

    #[cfg(test)]
    pub(crate) fn from_values(width: u32, height: u32, values: Vec<u8>) -> Self {
        LabelMask { width, height, values }
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.values[(y * self.width + x) as usize]
    }

    #[inline]
    fn set(&mut self, x: u32, y: u32, v: u8) {
        self.values[(y * self.width + x) as usize] = v;
    }

    /// Grayscale dilation by a `side x side` square structuring element,
    /// implemented as a separable max filter (two passes, rows then
    /// columns) — equivalent to the original's `CImg::dilate(15)` for a flat
    /// square kernel, but without the O(w*h*side^2) cost.
    fn dilate(&self, side: i32) -> LabelMask {
        let radius = side / 2;
        let (w, h) = (self.width as i32, self.height as i32);

        let mut rows = vec![0u8; self.values.len()];
        for y in 0..h {
            for x in 0..w {
                let lo = (x - radius).max(0);
                let hi = (x + radius).min(w - 1);
                let mut m = 0u8;
                for xx in lo..=hi {
                    m = m.max(self.get(xx as u32, y as u32));
                }
                rows[(y * w + x) as usize] = m;
            }
        }

        let mut out = LabelMask::zeros(self.width, self.height);
        for x in 0..w {
            for y in 0..h {
                let lo = (y - radius).max(0);
                let hi = (y + radius).min(h - 1);
                let mut m = 0u8;
                for yy in lo..=hi {
                    m = m.max(rows[(yy * w + x) as usize]);
                }
                out.set(x as u32, y as u32, m);
            }
        }
        out
    }
}

/// One training pixel location: which training image it belongs to and its
/// coordinates. A typed triple, per the arena/typed-sample redesign note in
/// §9, rather than a flat `3*N` integer array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub image_idx: u32,
    pub x: u32,
    pub y: u32,
}

/// The inside region of an image of size `width x height` for a given
/// window radius: `{(x, y) : r <= x < width - r, r <= y < height - r}`.
#[derive(Debug, Clone, Copy)]
pub struct InsideRegion {
    pub x0: u32,
    pub x1: u32,
    pub y0: u32,
    pub y1: u32,
}

impl InsideRegion {
    pub fn new(width: u32, height: u32, radius: u32) -> Result<Self> {
        Self::new_with_path(width, height, radius, std::path::Path::new(""))
    }

    pub fn new_with_path(width: u32, height: u32, radius: u32, path: &std::path::Path) -> Result<Self> {
        if width <= 2 * radius || height <= 2 * radius {
            return Err(SegError::ImageTooSmall {
                path: path.to_path_buf(),
                radius,
                width,
                height,
            });
        }
        Ok(InsideRegion {
            x0: radius,
            x1: width - radius,
            y0: radius,
            y1: height - radius,
        })
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }
}

/// A class-balanced pool of labeled pixel locations drawn from a set of
/// (training image, label image) pairs, plus the images themselves (the
/// tree trainer indexes samples back into them during split evaluation).
pub struct SampleSet {
    pub images: Vec<GrayImage>,
    pub masks: Vec<LabelMask>,
    pub palette: PaletteColors,
    pub samples: Vec<Sample>,
}

/// Scan a label image in raster order and discover the two nonzero colors
/// present, ordered so that `foreground > background` (§4.1 step 2).
/// Mirrors the original's two-slot scan: the first nonzero value becomes the
/// provisional background, the second distinct nonzero value becomes the
/// foreground, then the pair is swapped if needed.
fn discover_palette(label: &GrayImage) -> PaletteColors {
    let mut background = 0u8;
    let mut foreground = 0u8;
    'scan: for y in 0..label.height() {
        for x in 0..label.width() {
            let c = label.get(x, y);
            if c == 0 {
                continue;
            }
            if background == 0 {
                background = c;
            } else if c != background && foreground == 0 {
                foreground = c;
                break 'scan;
            }
        }
    }
    if foreground != 0 && foreground < background {
        std::mem::swap(&mut background, &mut foreground);
    }
    PaletteColors { background, foreground }
}

/// Build one image's label mask: inside-region pixels matching
/// `foreground_color` are marked 2; the rest are left for the caller to
/// class-balance. Returns the mask, the foreground count, and the
/// background count (§4.1 step 3). A third distinct nonzero value inside the
/// region is a `FormatError`.
fn build_label_mask(
    label: &GrayImage,
    region: InsideRegion,
    palette: PaletteColors,
    label_path_for_error: &std::path::Path,
) -> Result<(LabelMask, u32, u32)> {
    let mut mask = LabelMask::zeros(label.width(), label.height());
    let mut fg_count = 0u32;
    let mut bg_count = 0u32;

    for y in region.y0..region.y1 {
        for x in region.x0..region.x1 {
            let c = label.get(x, y);
            if c == 0 {
                continue;
            } else if c == palette.foreground {
                mask.set(x, y, 2);
                fg_count += 1;
            } else if c == palette.background {
                bg_count += 1;
            } else {
                return Err(SegError::TooManyLabels {
                    path: label_path_for_error.to_path_buf(),
                });
            }
        }
    }

    Ok((mask, fg_count, bg_count))
}

/// Hard-negative mining and background-class balancing for a single image's
/// mask (§4.1 steps 4-5). Returns the number of newly labeled pixels.
fn balance_classes(
    label: &GrayImage,
    mask: &mut LabelMask,
    region: InsideRegion,
    palette: PaletteColors,
    fg_count: u32,
    bg_count: u32,
    rng: &mut impl Rng,
) -> u32 {
    if bg_count <= fg_count {
        // fg >= bg: mark every inside-region background pixel.
        let mut marked = 0u32;
        for y in region.y0..region.y1 {
            for x in region.x0..region.x1 {
                if label.get(x, y) == palette.background {
                    mask.set(x, y, 1);
                    marked += 1;
                }
            }
        }
        return marked;
    }

    debug!(
        "hard-negative mining: {} foreground, {} background candidates in region",
        fg_count, bg_count
    );

    // Dilate the (currently sparse, 0/2-valued) mask so foreground-adjacent
    // pixels also read as 2.
    let dilated = mask.dilate(DILATION_SIZE);

    let target = fg_count;
    let mut marked_bg = 0u32;

    'scan: for y in region.y0..region.y1 {
        for x in region.x0..region.x1 {
            if dilated.get(x, y) == 2 && label.get(x, y) != palette.foreground {
                mask.set(x, y, 1);
                marked_bg += 1;
                if marked_bg == target {
                    break 'scan;
                }
            }
        }
    }

    if marked_bg < target {
        let mut attempts = 0u32;
        while marked_bg < target && attempts < BACKGROUND_DRAW_RETRY_LIMIT {
            attempts += 1;
            let x = rng.gen_range(region.x0..region.x1);
            let y = rng.gen_range(region.y0..region.y1);
            if label.get(x, y) == palette.background && mask.get(x, y) == 0 {
                mask.set(x, y, 1);
                marked_bg += 1;
            }
        }
        if marked_bg < target {
            warn!(
                "background draw pool exhausted after {} attempts ({}/{} marked); falling back to marking every remaining background pixel",
                attempts, marked_bg, target
            );
            for y in region.y0..region.y1 {
                for x in region.x0..region.x1 {
                    if marked_bg >= target {
                        break;
                    }
                    if label.get(x, y) == palette.background && mask.get(x, y) == 0 {
                        mask.set(x, y, 1);
                        marked_bg += 1;
                    }
                }
            }
        }
    }

    fg_count + marked_bg
}

impl SampleSet {
    /// Build a sample set from (training image, label image) pairs (§4.1).
    pub fn build(
        pairs: &[(std::path::PathBuf, std::path::PathBuf)],
        window_radius: u32,
        rng: &mut impl Rng,
    ) -> Result<SampleSet> {
        let mut images = Vec::with_capacity(pairs.len());
        let mut masks = Vec::with_capacity(pairs.len());
        let mut palette: Option<PaletteColors> = None;
        let mut samples = Vec::new();

        for (image_idx, (training_path, label_path)) in pairs.iter().enumerate() {
            let (training_img, label_img) = crate::image::load_pair(training_path, label_path)?;
            let region = InsideRegion::new_with_path(
                training_img.width(),
                training_img.height(),
                window_radius,
                training_path,
            )?;

            if palette.is_none() {
                palette = Some(discover_palette(&label_img));
            }
            let this_palette = palette.expect("just set above if unset");

            let (mut mask, fg_count, bg_count) =
                build_label_mask(&label_img, region, this_palette, label_path)?;
            balance_classes(&label_img, &mut mask, region, this_palette, fg_count, bg_count, rng);

            for y in region.y0..region.y1 {
                for x in region.x0..region.x1 {
                    if mask.get(x, y) > 0 {
                        samples.push(Sample {
                            image_idx: image_idx as u32,
                            x,
                            y,
                        });
                    }
                }
            }

            images.push(training_img);
            masks.push(mask);
        }

        let palette = palette.unwrap_or(PaletteColors {
            background: 1,
            foreground: 2,
        });

        debug!("sample set built: {} labeled pixels across {} images", samples.len(), images.len());

        Ok(SampleSet {
            images,
            masks,
            palette,
            samples,
        })
    }

    /// Label (0/1/2) of a given sample's location.
    #[inline]
    pub fn label_of(&self, sample: Sample) -> u8 {
        self.masks[sample.image_idx as usize].get(sample.x, sample.y)
    }

    /// Is `sample` a foreground training pixel?
    #[inline]
    pub fn is_foreground(&self, sample: Sample) -> bool {
        self.label_of(sample) == 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_palette_orders_foreground_above_background() {
        // first distinct nonzero value is 200 (background provisionally),
        // second is 50: must swap so foreground (200) > background (50).
        let pixels = vec![200u8, 200, 50, 50];
        let img = GrayImage::new(2, 2, pixels);
        let palette = discover_palette(&img);
        assert_eq!(palette.background, 50);
        assert_eq!(palette.foreground, 200);
    }

    #[test]
    fn dilation_spreads_foreground_marker() {
        let mut mask = LabelMask::zeros(5, 5);
        mask.set(2, 2, 2);
        let dilated = mask.dilate(3);
        assert_eq!(dilated.get(2, 2), 2);
        assert_eq!(dilated.get(1, 2), 2);
        assert_eq!(dilated.get(3, 3), 2);
        assert_eq!(dilated.get(0, 0), 0);
    }

    #[test]
    fn class_balance_marks_all_background_when_fg_dominant() {
        let label = GrayImage::fill(10, 10, 50);
        let mut label = label;
        for y in 0..10 {
            for x in 0..5 {
                label.set(x, y, 200);
            }
        }
        let region = InsideRegion::new(10, 10, 1).unwrap();
        let palette = PaletteColors {
            background: 50,
            foreground: 200,
        };
        let (mut mask, fg, bg) = build_label_mask(&label, region, palette, std::path::Path::new("x")).unwrap();
        assert!(fg >= bg);
        let mut rng = rand::thread_rng();
        balance_classes(&label, &mut mask, region, palette, fg, bg, &mut rng);
        let mut marked_bg = 0;
        for y in region.y0..region.y1 {
            for x in region.x0..region.x1 {
                if label.get(x, y) == palette.background {
                    assert_eq!(mask.get(x, y), 1);
                    marked_bg += 1;
                }
            }
        }
        assert_eq!(marked_bg, bg);
    }
}
