use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::PipelineError;

/// Side length of the normalized grid every image is resized to.
pub const GRID_SIZE: u32 = 28;

/// Number of values in a [`FeatureVector`] (28 × 28).
pub const FEATURE_LEN: usize = (GRID_SIZE * GRID_SIZE) as usize;

/// A class label. Labels are the names of the dataset's class directories.
pub type Label = String;

// ---------------------------------------------------------------------------
// FeatureVector – one vectorized image
// ---------------------------------------------------------------------------

/// A flattened, binarized 28×28 image: exactly [`FEATURE_LEN`] values,
/// row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    /// Wrap values read off the normalized grid.
    pub(crate) fn from_grid(values: Vec<f32>) -> Self {
        debug_assert_eq!(values.len(), FEATURE_LEN);
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Squared euclidean distance to another vector.  On binarized vectors
    /// this is the number of differing pixels.
    pub fn squared_distance(&self, other: &[f32]) -> f64 {
        self.0
            .iter()
            .zip(other)
            .map(|(a, b)| {
                let d = f64::from(a - b);
                d * d
            })
            .sum()
    }
}

impl TryFrom<Vec<f32>> for FeatureVector {
    type Error = PipelineError;

    fn try_from(values: Vec<f32>) -> Result<Self, Self::Error> {
        if values.len() != FEATURE_LEN {
            return Err(PipelineError::FeatureLength {
                expected: FEATURE_LEN,
                actual: values.len(),
            });
        }
        Ok(Self(values))
    }
}

impl AsRef<[f32]> for FeatureVector {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Dataset – feature matrix plus parallel labels
// ---------------------------------------------------------------------------

/// One labeled sample as produced by the loader.
#[derive(Debug, Clone)]
pub struct Sample {
    pub features: FeatureVector,
    pub label: Label,
    /// File the sample was read from.
    pub source: PathBuf,
}

/// An N × 784 feature matrix with a label per row.  Row `i` of
/// `features` belongs to `labels[i]` and was read from `sources[i]`.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub features: Vec<FeatureVector>,
    pub labels: Vec<Label>,
    pub sources: Vec<PathBuf>,
}

impl Dataset {
    pub fn from_samples(samples: Vec<Sample>) -> Self {
        let mut dataset = Dataset {
            features: Vec::with_capacity(samples.len()),
            labels: Vec::with_capacity(samples.len()),
            sources: Vec::with_capacity(samples.len()),
        };
        for sample in samples {
            dataset.push(sample);
        }
        dataset
    }

    pub fn push(&mut self, sample: Sample) {
        self.features.push(sample.features);
        self.labels.push(sample.label);
        self.sources.push(sample.source);
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Matrix shape as `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.len(), FEATURE_LEN)
    }

    /// Distinct labels in order of first appearance.
    pub fn distinct_labels(&self) -> Vec<Label> {
        let mut seen = Vec::new();
        for label in &self.labels {
            if !seen.contains(label) {
                seen.push(label.clone());
            }
        }
        seen
    }

    /// Row count per label.
    pub fn label_counts(&self) -> BTreeMap<Label, usize> {
        let mut counts = BTreeMap::new();
        for label in &self.labels {
            *counts.entry(label.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Iterate `(features, label)` row pairs.
    pub fn rows(&self) -> impl Iterator<Item = (&FeatureVector, &Label)> {
        self.features.iter().zip(&self.labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(fill: f32) -> FeatureVector {
        FeatureVector::try_from(vec![fill; FEATURE_LEN]).unwrap()
    }

    #[test]
    fn rejects_wrong_length() {
        let err = FeatureVector::try_from(vec![0.0; 10]).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::FeatureLength { expected: 784, actual: 10 }
        ));
    }

    #[test]
    fn squared_distance_counts_differing_pixels() {
        let mut values = vec![0.0; FEATURE_LEN];
        values[0] = 1.0;
        values[5] = 1.0;
        let a = FeatureVector::try_from(values).unwrap();
        assert_eq!(a.squared_distance(vector(0.0).as_slice()), 2.0);
    }

    #[test]
    fn distinct_labels_keep_first_appearance_order() {
        let mut dataset = Dataset::default();
        for label in ["7", "3", "7", "1"] {
            dataset.push(Sample {
                features: vector(0.0),
                label: label.to_string(),
                source: PathBuf::from(format!("{label}.png")),
            });
        }
        assert_eq!(dataset.distinct_labels(), vec!["7", "3", "1"]);
        assert_eq!(dataset.label_counts()["7"], 2);
        assert_eq!(dataset.shape(), (4, FEATURE_LEN));
    }
}
