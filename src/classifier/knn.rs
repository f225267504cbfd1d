use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use super::{Classifier, Fit};
use crate::data::model::{Dataset, FeatureVector, Label, FEATURE_LEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnnParams {
    /// Number of neighbours that vote.
    pub k: usize,
}

impl Default for KnnParams {
    fn default() -> Self {
        Self { k: 3 }
    }
}

/// k-nearest-neighbours vote over the stored training set.
///
/// Probabilities are native: each class gets the share of the `k` nearest
/// samples carrying its label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "KnnFile")]
pub struct KNearest {
    k: usize,
    classes: Vec<Label>,
    samples: Vec<Vec<f32>>,
    /// Class index of each stored sample.
    targets: Vec<usize>,
}

/// Unchecked on-disk form, validated through [`KNearest::from_parts`].
#[derive(Deserialize)]
struct KnnFile {
    k: usize,
    classes: Vec<Label>,
    samples: Vec<Vec<f32>>,
    targets: Vec<usize>,
}

impl TryFrom<KnnFile> for KNearest {
    type Error = anyhow::Error;

    fn try_from(file: KnnFile) -> Result<Self> {
        Self::from_parts(file.k, file.classes, file.samples, file.targets)
    }
}

impl KNearest {
    /// Every target must index into `classes`, with one target per sample.
    pub fn from_parts(
        k: usize,
        classes: Vec<Label>,
        samples: Vec<Vec<f32>>,
        targets: Vec<usize>,
    ) -> Result<Self> {
        if k == 0 {
            bail!("k must be at least 1");
        }
        if classes.is_empty() || samples.is_empty() {
            bail!("a k-nearest model needs at least one class and one sample");
        }
        if samples.len() != targets.len() {
            bail!("{} samples but {} targets", samples.len(), targets.len());
        }
        if let Some(bad) = samples.iter().position(|s| s.len() != FEATURE_LEN) {
            bail!(
                "sample {bad} has {} values, expected {FEATURE_LEN}",
                samples[bad].len()
            );
        }
        if let Some(&bad) = targets.iter().find(|&&t| t >= classes.len()) {
            bail!("target {bad} out of range for {} classes", classes.len());
        }
        Ok(Self {
            k,
            classes,
            samples,
            targets,
        })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// `(distance, class index)` of the nearest samples, closest first.
    /// Equal distances keep training order.
    fn neighbours(&self, features: &FeatureVector) -> Vec<(f64, usize)> {
        let mut all: Vec<(f64, usize)> = self
            .samples
            .iter()
            .zip(&self.targets)
            .map(|(sample, &target)| (features.squared_distance(sample), target))
            .collect();
        all.sort_by(|a, b| a.0.total_cmp(&b.0));
        all.truncate(self.k);
        all
    }

    fn votes(&self, neighbours: &[(f64, usize)]) -> Vec<usize> {
        let mut votes = vec![0usize; self.classes.len()];
        for &(_, target) in neighbours {
            votes[target] += 1;
        }
        votes
    }
}

impl Classifier for KNearest {
    fn classes(&self) -> &[Label] {
        &self.classes
    }

    fn predict(&self, features: &FeatureVector) -> Result<Label> {
        let neighbours = self.neighbours(features);
        let votes = self.votes(&neighbours);
        let Some(&top) = votes.iter().max() else {
            bail!("model has no classes");
        };
        // Among classes tied for the most votes, the one holding the
        // closest neighbour wins.
        let winner = neighbours
            .iter()
            .map(|&(_, target)| target)
            .find(|&target| votes[target] == top);
        match winner {
            Some(target) => Ok(self.classes[target].clone()),
            None => bail!("model has no training samples"),
        }
    }

    fn predict_proba(&self, features: &FeatureVector) -> Option<Result<Vec<f64>>> {
        let neighbours = self.neighbours(features);
        if neighbours.is_empty() {
            return Some(Err(anyhow::anyhow!("model has no training samples")));
        }
        let total = neighbours.len() as f64;
        let probs = self
            .votes(&neighbours)
            .into_iter()
            .map(|v| v as f64 / total)
            .collect();
        Some(Ok(probs))
    }
}

impl Fit for KNearest {
    type Params = KnnParams;

    fn fit(dataset: &Dataset, params: &KnnParams) -> Result<Self> {
        if dataset.is_empty() {
            bail!("cannot fit a k-nearest model to an empty dataset");
        }
        let classes = dataset.distinct_labels();
        let targets = dataset
            .labels
            .iter()
            .map(|label| {
                classes
                    .iter()
                    .position(|c| c == label)
                    .context("label missing from class list")
            })
            .collect::<Result<Vec<_>>>()?;
        let samples = dataset
            .features
            .iter()
            .map(|f| f.as_slice().to_vec())
            .collect();

        Self::from_parts(params.k, classes, samples, targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Sample;
    use std::path::PathBuf;

    fn vector_with(ones: &[usize]) -> FeatureVector {
        let mut values = vec![0.0; FEATURE_LEN];
        for &i in ones {
            values[i] = 1.0;
        }
        FeatureVector::try_from(values).unwrap()
    }

    fn fitted(k: usize) -> KNearest {
        let rows: [(&[usize], &str); 5] = [
            (&[0, 1], "b"),
            (&[0, 1, 2], "b"),
            (&[0], "b"),
            (&[500, 501], "a"),
            (&[500, 502], "a"),
        ];
        let ds = Dataset::from_samples(
            rows.iter()
                .map(|(ones, label)| Sample {
                    features: vector_with(ones),
                    label: label.to_string(),
                    source: PathBuf::new(),
                })
                .collect(),
        );
        KNearest::fit(&ds, &KnnParams { k }).unwrap()
    }

    fn stored(targets: Vec<usize>) -> serde_json::Value {
        let samples = vec![vec![0.0f32; FEATURE_LEN]; targets.len()];
        serde_json::json!({
            "k": 1,
            "classes": ["0"],
            "samples": samples,
            "targets": targets,
        })
    }

    #[test]
    fn probabilities_are_vote_shares() {
        let model = fitted(3);
        assert_eq!(model.classes(), ["b", "a"]);
        let probs = model.predict_proba(&vector_with(&[0, 1])).unwrap().unwrap();
        assert_eq!(probs, vec![1.0, 0.0]);

        let model = fitted(4);
        let probs = model.predict_proba(&vector_with(&[500])).unwrap().unwrap();
        assert_eq!(probs, vec![0.5, 0.5]);
        assert!(model.decision_function(&vector_with(&[500])).is_none());
    }

    #[test]
    fn tied_vote_goes_to_closest_neighbour() {
        let model = fitted(4);
        // Closest samples: the two "a" rows (distance 1) then "b" rows.
        assert_eq!(model.predict(&vector_with(&[500])).unwrap(), "a");
    }

    #[test]
    fn k_larger_than_training_set_uses_every_sample() {
        let model = fitted(50);
        let probs = model.predict_proba(&vector_with(&[0])).unwrap().unwrap();
        assert_eq!(probs, vec![0.6, 0.4]);
        assert_eq!(model.predict(&vector_with(&[500])).unwrap(), "b");
    }

    #[test]
    fn zero_k_is_rejected() {
        let ds = Dataset::from_samples(vec![Sample {
            features: vector_with(&[]),
            label: "0".into(),
            source: PathBuf::new(),
        }]);
        assert!(KNearest::fit(&ds, &KnnParams { k: 0 }).is_err());
    }

    #[test]
    fn fit_keeps_k_and_survives_json() {
        let model = fitted(2);
        assert_eq!(model.k(), 2);
        let text = serde_json::to_string(&model).unwrap();
        assert_eq!(serde_json::from_str::<KNearest>(&text).unwrap(), model);
    }

    #[test]
    fn deserializing_rejects_out_of_range_target() {
        assert!(serde_json::from_value::<KNearest>(stored(vec![0])).is_ok());
        let err = serde_json::from_value::<KNearest>(stored(vec![5])).unwrap_err();
        assert!(err.to_string().contains("target 5 out of range"));
    }

    #[test]
    fn deserializing_rejects_short_samples_and_missing_targets() {
        let mut short = stored(vec![0]);
        short["samples"] = serde_json::json!([[0.0, 1.0]]);
        assert!(serde_json::from_value::<KNearest>(short).is_err());

        let mut untargeted = stored(vec![0]);
        untargeted["targets"] = serde_json::json!([]);
        assert!(serde_json::from_value::<KNearest>(untargeted).is_err());
    }
}
