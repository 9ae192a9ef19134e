//! The `ImageSource` facade: a thin wrapper around the `image` crate that
//! reduces any input raster to a single 8-bit channel, as specified by §1
//! ("only the first channel is consumed").

use std::path::{Path, PathBuf};

use crate::error::{Result, SegError};

/// A 2D array of 8-bit grayscale samples.
#[derive(Debug, Clone)]
pub struct GrayImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl GrayImage {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), (width as usize) * (height as usize));
        GrayImage { width, height, pixels }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let img = image::open(path).map_err(|source| SegError::ImageRead {
            path: path.to_path_buf(),
            source,
        })?;
        let gray = img.into_luma8();
        let (width, height) = (gray.width(), gray.height());
        Ok(GrayImage {
            width,
            height,
            pixels: gray.into_raw(),
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let buffer =
            image::GrayImage::from_raw(self.width, self.height, self.pixels.clone())
                .expect("width/height always match pixels.len()");
        buffer.save(path.as_ref()).map_err(|source| SegError::ImageRead {
            path: path.as_ref().to_path_buf(),
            source,
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel access by (x, y). Panics on out-of-bounds access: the spec
    /// forbids it ("Out-of-bounds access is forbidden"), so a panic here
    /// signals a bug in the caller's bounds reasoning, not bad input.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.pixels[(y * self.width + x) as usize]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: u8) {
        self.pixels[(y * self.width + x) as usize] = value;
    }

    /// Signed pixel difference `img[x1,y1] - img[x2,y2]`, used by the
    /// pixel-pair-difference split test.
    #[inline]
    pub fn signed_diff(&self, x1: i64, y1: i64, x2: i64, y2: i64) -> i32 {
        let a = self.pixels[(y1 as u64 * self.width as u64 + x1 as u64) as usize] as i32;
        let b = self.pixels[(y2 as u64 * self.width as u64 + x2 as u64) as usize] as i32;
        a - b
    }

    pub fn dims_eq(&self, other: &GrayImage) -> bool {
        self.width == other.width && self.height == other.height
    }

    pub fn fill(width: u32, height: u32, value: u8) -> Self {
        GrayImage {
            width,
            height,
            pixels: vec![value; (width as usize) * (height as usize)],
        }
    }
}

/// Load a pair of (training image, label image) and validate their
/// dimensions match (§4.1 step 1).
pub fn load_pair(training_path: &Path, label_path: &Path) -> Result<(GrayImage, GrayImage)> {
    let training = GrayImage::load(training_path)?;
    let label = GrayImage::load(label_path)?;
    if !training.dims_eq(&label) {
        return Err(SegError::DimensionMismatch {
            a: training_path.to_path_buf(),
            aw: training.width(),
            ah: training.height(),
            b: label_path.to_path_buf(),
            bw: label.width(),
            bh: label.height(),
        });
    }
    Ok((training, label))
}

pub fn check_image_counts(training: &[PathBuf], labels: &[PathBuf]) -> Result<()> {
    if training.len() != labels.len() {
        return Err(SegError::UnequalImageCounts {
            training: training.len(),
            labels: labels.len(),
        });
    }
    Ok(())
}
