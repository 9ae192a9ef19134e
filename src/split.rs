//! The sole `SplitTest` variant: pixel-pair-difference (§3, §9 "Polymorphism
//! over SplitTest" — a single concrete record, no trait object, since no
//! other variant is ever built).

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::image::GrayImage;
use crate::sample::{Sample, SampleSet};

/// Compare the grayscale difference between two offset neighbors of a query
/// pixel against an integer threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitTest {
    pub dx1: i16,
    pub dy1: i16,
    pub dx2: i16,
    pub dy2: i16,
    pub threshold: i16,
}

impl SplitTest {
    /// Draw a random test: four offsets uniform in `[-r, r]`, threshold
    /// uniform in `[-255, 255]`.
    pub fn sample(radius: u32, rng: &mut impl Rng) -> SplitTest {
        let r = radius as i16;
        SplitTest {
            dx1: rng.gen_range(-r..=r),
            dy1: rng.gen_range(-r..=r),
            dx2: rng.gen_range(-r..=r),
            dy2: rng.gen_range(-r..=r),
            threshold: rng.gen_range(-255..=255),
        }
    }

    /// `goes_left(img, x, y) = img[x+dx1, y+dy1] - img[x+dx2, y+dy2] < threshold`
    #[inline]
    pub fn goes_left_xy(&self, img: &GrayImage, x: u32, y: u32) -> bool {
        let diff = img.signed_diff(
            x as i64 + self.dx1 as i64,
            y as i64 + self.dy1 as i64,
            x as i64 + self.dx2 as i64,
            y as i64 + self.dy2 as i64,
        );
        diff < self.threshold as i32
    }

    #[inline]
    pub fn goes_left(&self, samples: &SampleSet, sample: Sample) -> bool {
        let img = &samples.images[sample.image_idx as usize];
        self.goes_left_xy(img, sample.x, sample.y)
    }

    /// Serialize as the 5-element array `[dx1, dy1, dx2, dy2, threshold]`
    /// per §6.
    pub fn to_json_array(&self) -> [i32; 5] {
        [
            self.dx1 as i32,
            self.dy1 as i32,
            self.dx2 as i32,
            self.dy2 as i32,
            self.threshold as i32,
        ]
    }

    pub fn from_json_array(arr: [i32; 5]) -> SplitTest {
        SplitTest {
            dx1: arr[0] as i16,
            dy1: arr[1] as i16,
            dx2: arr[2] as i16,
            dy2: arr[3] as i16,
            threshold: arr[4] as i16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goes_left_matches_predicate() {
        let img = GrayImage::new(3, 3, vec![10, 20, 30, 40, 50, 60, 70, 80, 90]);
        let test = SplitTest {
            dx1: 0,
            dy1: 0,
            dx2: 1,
            dy2: 0,
            threshold: 0,
        };
        // center pixel (1,1)=50, right neighbor (2,1)=60: 50-60=-10 < 0 -> left
        assert!(test.goes_left_xy(&img, 1, 1));
    }

    #[test]
    fn json_round_trips() {
        let t = SplitTest {
            dx1: 1,
            dy1: 0,
            dx2: -1,
            dy2: 0,
            threshold: 0,
        };
        let arr = t.to_json_array();
        let back = SplitTest::from_json_array(arr);
        assert_eq!(t, back);
    }
}
