use std::path::PathBuf;

use thiserror::Error;

/// Failures of the data layer (vectorizing images and assembling datasets).
///
/// Variants tied to a file or directory carry its path so the message can be shown
/// to a user as-is.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The image could not be opened or decoded.
    #[error("failed to decode image {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The dataset root does not exist or is not a directory.
    #[error("dataset directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    /// The dataset root exists but holds no file with a matching extension.
    #[error("no images with extensions {extensions:?} found under {}", .root.display())]
    EmptyDataset {
        root: PathBuf,
        extensions: Vec<String>,
    },

    /// Listing a directory failed.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A feature vector was built from the wrong number of values.
    #[error("feature vector must have {expected} values, got {actual}")]
    FeatureLength { expected: usize, actual: usize },
}
