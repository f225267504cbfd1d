use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use super::{argmax, Classifier, Fit};
use crate::data::model::{Dataset, FeatureVector, Label, FEATURE_LEN};

/// Assigns each sample to the class whose mean feature vector is closest.
///
/// Exposes margins only: the margin for a class is the negated squared
/// distance to its centroid, so confidence goes through softmax.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CentroidFile")]
pub struct NearestCentroid {
    classes: Vec<Label>,
    centroids: Vec<Vec<f32>>,
}

/// Unchecked on-disk form, validated through [`NearestCentroid::from_centroids`].
#[derive(Deserialize)]
struct CentroidFile {
    classes: Vec<Label>,
    centroids: Vec<Vec<f32>>,
}

impl TryFrom<CentroidFile> for NearestCentroid {
    type Error = anyhow::Error;

    fn try_from(file: CentroidFile) -> Result<Self> {
        Self::from_centroids(file.classes, file.centroids)
    }
}

impl NearestCentroid {
    pub fn from_centroids(classes: Vec<Label>, centroids: Vec<Vec<f32>>) -> Result<Self> {
        if classes.is_empty() {
            bail!("a nearest-centroid model needs at least one class");
        }
        if classes.len() != centroids.len() {
            bail!(
                "{} classes but {} centroids",
                classes.len(),
                centroids.len()
            );
        }
        if let Some(bad) = centroids.iter().position(|c| c.len() != FEATURE_LEN) {
            bail!(
                "centroid for class {:?} has {} values, expected {FEATURE_LEN}",
                classes[bad],
                centroids[bad].len()
            );
        }
        Ok(Self { classes, centroids })
    }

    pub fn centroids(&self) -> &[Vec<f32>] {
        &self.centroids
    }

    fn margins(&self, features: &FeatureVector) -> Vec<f64> {
        self.centroids
            .iter()
            .map(|c| -features.squared_distance(c))
            .collect()
    }
}

impl Classifier for NearestCentroid {
    fn classes(&self) -> &[Label] {
        &self.classes
    }

    fn predict(&self, features: &FeatureVector) -> Result<Label> {
        let best = argmax(&self.margins(features)).context("model has no classes")?;
        Ok(self.classes[best].clone())
    }

    fn decision_function(&self, features: &FeatureVector) -> Option<Result<Vec<f64>>> {
        Some(Ok(self.margins(features)))
    }
}

impl Fit for NearestCentroid {
    type Params = ();

    fn fit(dataset: &Dataset, _params: &()) -> Result<Self> {
        if dataset.is_empty() {
            bail!("cannot fit a nearest-centroid model to an empty dataset");
        }
        let classes = dataset.distinct_labels();
        let mut sums = vec![vec![0.0f64; FEATURE_LEN]; classes.len()];
        let mut counts = vec![0usize; classes.len()];

        for (features, label) in dataset.rows() {
            let idx = classes
                .iter()
                .position(|c| c == label)
                .context("label missing from class list")?;
            counts[idx] += 1;
            for (sum, &v) in sums[idx].iter_mut().zip(features.as_slice()) {
                *sum += f64::from(v);
            }
        }

        let centroids = sums
            .into_iter()
            .zip(&counts)
            .map(|(sum, &n)| sum.into_iter().map(|s| (s / n as f64) as f32).collect())
            .collect();

        log::debug!("Fitted {} centroids from {} samples", classes.len(), dataset.len());
        Self::from_centroids(classes, centroids)
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

    fn dataset(rows: &[(&[usize], &str)]) -> Dataset {
        Dataset::from_samples(
            rows.iter()
                .map(|(ones, label)| Sample {
                    features: vector_with(ones),
                    label: label.to_string(),
                    source: PathBuf::new(),
                })
                .collect(),
        )
    }

    #[test]
    fn fit_averages_each_class() {
        let ds = dataset(&[(&[0, 1], "a"), (&[0], "a"), (&[10], "b")]);
        let model = NearestCentroid::fit(&ds, &()).unwrap();
        assert_eq!(model.classes(), ["a", "b"]);
        assert_eq!(model.centroids()[0][0], 1.0);
        assert_eq!(model.centroids()[0][1], 0.5);
        assert_eq!(model.centroids()[1][10], 1.0);
    }

    #[test]
    fn predicts_closest_centroid_and_exposes_margins_only() {
        let ds = dataset(&[(&[0, 1, 2], "left"), (&[700, 701, 702], "right")]);
        let model = NearestCentroid::fit(&ds, &()).unwrap();

        let query = vector_with(&[700, 701]);
        assert_eq!(model.predict(&query).unwrap(), "right");
        assert!(model.predict_proba(&query).is_none());

        let margins = model.decision_function(&query).unwrap().unwrap();
        assert_eq!(margins, vec![-5.0, -1.0]);
    }

    #[test]
    fn empty_dataset_is_rejected() {
        assert!(NearestCentroid::fit(&Dataset::default(), &()).is_err());
    }

    #[test]
    fn mismatched_centroids_are_rejected() {
        let err = NearestCentroid::from_centroids(vec!["0".into()], vec![vec![0.0; 3]]).unwrap_err();
        assert!(err.to_string().contains("expected 784"));
    }

    #[test]
    fn deserializing_checks_centroid_count() {
        let ones = vec![1.0f32; FEATURE_LEN];
        let zeros = vec![0.0f32; FEATURE_LEN];
        let json = serde_json::json!({ "classes": ["0"], "centroids": [ones, zeros] });
        let err = serde_json::from_value::<NearestCentroid>(json).unwrap_err();
        assert!(err.to_string().contains("1 classes but 2 centroids"));
    }

    #[test]
    fn fitted_model_survives_json() {
        let ds = dataset(&[(&[0], "a"), (&[5], "b")]);
        let model = NearestCentroid::fit(&ds, &()).unwrap();
        let text = serde_json::to_string(&model).unwrap();
        assert_eq!(serde_json::from_str::<NearestCentroid>(&text).unwrap(), model);
    }
}
