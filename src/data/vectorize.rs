use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};

use super::model::{FeatureVector, GRID_SIZE};
use crate::error::PipelineError;

/// Mean intensity above which an image is treated as dark ink on a light
/// background.
pub const INVERSION_THRESHOLD: f64 = 127.0;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// How image polarity is normalized before binarization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Invert images whose mean intensity exceeds [`INVERSION_THRESHOLD`]
    /// so every sample is light ink on a dark background.
    #[default]
    AutoInvert,
    /// Use pixel intensities as decoded.
    AsIs,
}

/// Resampling filter used to bring images to the 28×28 grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    #[default]
    Nearest,
    Triangle,
    CatmullRom,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
        }
    }
}

/// Settings shared by the training and inference paths.  A model must be
/// used with the same options it was trained with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorizeOptions {
    pub polarity: Polarity,
    pub resize_filter: ResizeFilter,
}

// ---------------------------------------------------------------------------
// Vectorization
// ---------------------------------------------------------------------------

/// Open an image file and convert it to a [`FeatureVector`].
pub fn vectorize_path(path: &Path, options: &VectorizeOptions) -> Result<FeatureVector, PipelineError> {
    let image = image::open(path).map_err(|source| PipelineError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(vectorize_image(&image, options))
}

/// Convert a decoded image of any size and colour mode to a
/// [`FeatureVector`].  Never fails.
pub fn vectorize_image(image: &DynamicImage, options: &VectorizeOptions) -> FeatureVector {
    let grid = normalized_grid(image, options);
    FeatureVector::from_grid(grid.as_raw().iter().map(|&p| binarize(p)).collect())
}

/// The 28×28 grayscale grid after resizing and polarity correction, before
/// binarization.
pub fn normalized_grid(image: &DynamicImage, options: &VectorizeOptions) -> GrayImage {
    let gray = image.to_luma8();
    let mut grid = if gray.dimensions() == (GRID_SIZE, GRID_SIZE) {
        gray
    } else {
        imageops::resize(&gray, GRID_SIZE, GRID_SIZE, options.resize_filter.into())
    };

    if options.polarity == Polarity::AutoInvert && is_light_background(&grid) {
        imageops::invert(&mut grid);
    }
    grid
}

/// Mean pixel intensity, in `[0, 255]`.
pub fn mean_intensity(grid: &GrayImage) -> f64 {
    let pixels = grid.as_raw();
    if pixels.is_empty() {
        return 0.0;
    }
    let total: u64 = pixels.iter().map(|&p| u64::from(p)).sum();
    total as f64 / pixels.len() as f64
}

fn is_light_background(grid: &GrayImage) -> bool {
    mean_intensity(grid) > INVERSION_THRESHOLD
}

/// Scale to `[0, 1]` and round: 0..=127 → 0.0, 128..=255 → 1.0.
fn binarize(pixel: u8) -> f32 {
    (f32::from(pixel) / 255.0).round()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::FEATURE_LEN;
    use image::{ImageBuffer, Luma, Rgb};

    fn gray(width: u32, height: u32, f: impl Fn(u32, u32) -> u8) -> DynamicImage {
        DynamicImage::ImageLuma8(ImageBuffer::from_fn(width, height, |x, y| Luma([f(x, y)])))
    }

    #[test]
    fn binarize_threshold_sits_between_127_and_128() {
        assert_eq!(binarize(0), 0.0);
        assert_eq!(binarize(127), 0.0);
        assert_eq!(binarize(128), 1.0);
        assert_eq!(binarize(255), 1.0);
    }

    #[test]
    fn any_size_and_mode_gives_784_binary_values() {
        let rgb = DynamicImage::ImageRgb8(ImageBuffer::from_fn(61, 17, |x, y| {
            Rgb([(x * 4) as u8, (y * 15) as u8, ((x + y) * 3) as u8])
        }));
        for image in [rgb, gray(3, 90, |x, y| (x * 80 + y) as u8), gray(1, 1, |_, _| 200)] {
            let v = vectorize_image(&image, &VectorizeOptions::default());
            assert_eq!(v.len(), FEATURE_LEN);
            assert!(v.as_slice().iter().all(|&p| p == 0.0 || p == 1.0));
        }
    }

    #[test]
    fn dark_background_is_left_untouched() {
        // Light stroke on dark background, mean well below 127.
        let image = gray(28, 28, |x, _| if x == 14 { 255 } else { 10 });
        let options = VectorizeOptions::default();
        let grid = normalized_grid(&image, &options);
        assert_eq!(grid.as_raw(), image.to_luma8().as_raw());

        let v = vectorize_image(&image, &options);
        assert_eq!(v.as_slice()[14], 1.0);
        assert_eq!(v.as_slice()[0], 0.0);
        assert_eq!(v.as_slice().iter().sum::<f32>(), 28.0);
    }

    #[test]
    fn light_background_is_inverted() {
        // Dark stroke on white paper.
        let image = gray(28, 28, |x, _| if x == 14 { 0 } else { 250 });
        let v = vectorize_image(&image, &VectorizeOptions::default());
        assert_eq!(v.as_slice()[14], 1.0);
        assert_eq!(v.as_slice()[0], 0.0);
        assert_eq!(v.as_slice().iter().sum::<f32>(), 28.0);
    }

    #[test]
    fn as_is_policy_skips_inversion() {
        let image = gray(28, 28, |x, _| if x == 14 { 0 } else { 250 });
        let options = VectorizeOptions {
            polarity: Polarity::AsIs,
            ..VectorizeOptions::default()
        };
        let v = vectorize_image(&image, &options);
        assert_eq!(v.as_slice()[14], 0.0);
        assert_eq!(v.as_slice().iter().sum::<f32>(), (FEATURE_LEN - 28) as f32);
    }

    #[test]
    fn mean_exactly_at_threshold_is_not_inverted() {
        let image = gray(28, 28, |_, _| 127);
        let grid = normalized_grid(&image, &VectorizeOptions::default());
        assert_eq!(mean_intensity(&grid), 127.0);
        assert!(grid.as_raw().iter().all(|&p| p == 127));
    }

    #[test]
    fn nearest_resize_keeps_block_structure() {
        // 56x56 image: left half white, right half black.
        let image = gray(56, 56, |x, _| if x < 28 { 255 } else { 0 });
        let options = VectorizeOptions {
            polarity: Polarity::AsIs,
            ..VectorizeOptions::default()
        };
        let v = vectorize_image(&image, &options);
        for row in v.as_slice().chunks(28) {
            assert!(row[..14].iter().all(|&p| p == 1.0));
            assert!(row[14..].iter().all(|&p| p == 0.0));
        }
    }

    #[test]
    fn missing_file_is_a_decode_error() {
        let err = vectorize_path(Path::new("/nonexistent/7.png"), &VectorizeOptions::default())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
        assert!(err.to_string().contains("7.png"));
    }
}
