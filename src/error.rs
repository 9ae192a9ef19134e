use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the segmentation core.
///
/// Every public entry point returns `Result<_, SegError>`; there is no partial
/// recovery inside the core, matching the propagation policy of the original
/// tool (a failure there aborted the process).
#[derive(Debug, Error)]
pub enum SegError {
    #[error("could not read image {path:?}: {source}")]
    ImageRead {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("{a:?} ({aw}x{ah}) and {b:?} ({bw}x{bh}) must have the same dimensions")]
    DimensionMismatch {
        a: PathBuf,
        aw: u32,
        ah: u32,
        b: PathBuf,
        bh: u32,
        bw: u32,
    },

    #[error("expected the same number of training and label images, got {training} and {labels}")]
    UnequalImageCounts { training: usize, labels: usize },

    #[error("image {path:?} is too small for window radius {radius}: {width}x{height}")]
    ImageTooSmall {
        path: PathBuf,
        radius: u32,
        width: u32,
        height: u32,
    },

    #[error("label source {path:?} contains more than two distinct nonzero values")]
    TooManyLabels { path: PathBuf },

    #[error("forest file {path:?} is not valid JSON: {source}")]
    ForestJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("forest file {path:?} violates the expected array schema: {reason}")]
    ForestSchema { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SegError>;
