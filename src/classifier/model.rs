use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::{Classifier, Fit, KNearest, KnnParams, NearestCentroid};
use crate::data::model::{Dataset, FeatureVector, Label};

/// Hyperparameters selecting which reference classifier to fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum ModelParams {
    NearestCentroid,
    KNearest(KnnParams),
}

impl Default for ModelParams {
    fn default() -> Self {
        ModelParams::KNearest(KnnParams::default())
    }
}

/// Any of the reference classifiers, in the form written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum Model {
    NearestCentroid(NearestCentroid),
    KNearest(KNearest),
}

impl Model {
    pub fn algorithm(&self) -> &'static str {
        match self {
            Model::NearestCentroid(_) => "nearest_centroid",
            Model::KNearest(_) => "k_nearest",
        }
    }

    fn inner(&self) -> &dyn Classifier {
        match self {
            Model::NearestCentroid(m) => m,
            Model::KNearest(m) => m,
        }
    }
}

impl Classifier for Model {
    fn classes(&self) -> &[Label] {
        self.inner().classes()
    }

    fn predict(&self, features: &FeatureVector) -> Result<Label> {
        self.inner().predict(features)
    }

    fn predict_proba(&self, features: &FeatureVector) -> Option<Result<Vec<f64>>> {
        self.inner().predict_proba(features)
    }

    fn decision_function(&self, features: &FeatureVector) -> Option<Result<Vec<f64>>> {
        self.inner().decision_function(features)
    }
}

impl Fit for Model {
    type Params = ModelParams;

    fn fit(dataset: &Dataset, params: &ModelParams) -> Result<Self> {
        Ok(match params {
            ModelParams::NearestCentroid => Model::NearestCentroid(NearestCentroid::fit(dataset, &())?),
            ModelParams::KNearest(p) => Model::KNearest(KNearest::fit(dataset, p)?),
        })
    }
}
