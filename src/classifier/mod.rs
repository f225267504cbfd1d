/// Classifier capability contract and the reference classifiers.
///
/// The pipeline never depends on a concrete algorithm.  Scoring and the
/// harnesses take anything implementing [`Classifier`]; training takes
/// anything implementing [`Fit`].  A classifier must be able to predict a
/// label and should expose at least one of the two confidence
/// capabilities:
///
/// * [`Classifier::predict_proba`] – a probability per class, or
/// * [`Classifier::decision_function`] – a raw margin per class.
pub mod centroid;
pub mod knn;
pub mod model;
pub mod store;

use anyhow::Result;

use crate::data::model::{Dataset, FeatureVector, Label};

pub use centroid::NearestCentroid;
pub use knn::{KNearest, KnnParams};
pub use model::{Model, ModelParams};
pub use store::{JsonModelStore, ModelStore};

pub trait Classifier {
    /// Labels in the order the classifier reports probabilities and
    /// margins.  Not necessarily sorted.
    fn classes(&self) -> &[Label];

    fn predict(&self, features: &FeatureVector) -> Result<Label>;

    /// One probability per entry of [`classes`](Self::classes), summing to 1.
    /// `None` when the classifier has no native probability output.
    fn predict_proba(&self, _features: &FeatureVector) -> Option<Result<Vec<f64>>> {
        None
    }

    /// One raw margin per entry of [`classes`](Self::classes).  Two-class
    /// classifiers may return a single margin favouring `classes[1]`.
    fn decision_function(&self, _features: &FeatureVector) -> Option<Result<Vec<f64>>> {
        None
    }
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn classes(&self) -> &[Label] {
        (**self).classes()
    }

    fn predict(&self, features: &FeatureVector) -> Result<Label> {
        (**self).predict(features)
    }

    fn predict_proba(&self, features: &FeatureVector) -> Option<Result<Vec<f64>>> {
        (**self).predict_proba(features)
    }

    fn decision_function(&self, features: &FeatureVector) -> Option<Result<Vec<f64>>> {
        (**self).decision_function(features)
    }
}

/// A classifier that can be fitted to a [`Dataset`].
pub trait Fit: Classifier + Sized {
    type Params: std::fmt::Debug;

    fn fit(dataset: &Dataset, params: &Self::Params) -> Result<Self>;
}

/// Index of the largest value; the first one wins on ties.
pub(crate) fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, v) in values.iter().enumerate() {
        match best {
            Some(b) if values[b] >= *v => {}
            _ => best = Some(i),
        }
    }
    best
}
