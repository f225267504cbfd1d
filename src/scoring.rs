//! Confidence scoring: turns a classifier's raw output into a normalized
//! distribution over its classes, the predicted label's confidence, and a
//! ranked top-k list.

use std::collections::HashMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classifier::Classifier;
use crate::data::model::{FeatureVector, Label};

/// Most ranked classes a prediction reports, and the default.
pub const MAX_TOP_K: usize = 3;

/// Allowed deviation of a distribution's sum from 1.
pub const SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringOptions {
    /// Length of the ranked list, in `1..=MAX_TOP_K`.
    pub top_k: usize,
}

impl Default for ScoringOptions {
    fn default() -> Self {
        Self {
            top_k: MAX_TOP_K,
        }
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Where the probability distribution came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbabilitySource {
    /// The classifier's own probability output.
    Native,
    /// Softmax over the classifier's margins.
    Softmax,
}

/// One entry of a top-k list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedLabel {
    pub label: Label,
    pub probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredPrediction {
    /// Label returned by the classifier's own `predict`.  It may differ
    /// from the most probable class when scores are nearly tied.
    pub label: Label,
    /// Probability of `label`.
    pub confidence: f64,
    /// Most probable classes, descending; ties keep class order.
    pub top_k: Vec<RankedLabel>,
    /// The classifier's classes, in its order.
    pub classes: Vec<Label>,
    /// One probability per entry of `classes`.
    pub probabilities: Vec<f64>,
    pub source: ProbabilitySource,
}

/// Why a prediction carries no confidence.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ScoreError {
    #[error("classifier exposes neither probabilities nor margins")]
    Unsupported,
    #[error("confidence output failed: {0}")]
    Capability(String),
    #[error("predicted label {0:?} is not one of the classifier's classes")]
    UnknownLabel(Label),
    #[error("classifier has {expected} classes but produced {actual} scores")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("scores do not form a probability distribution")]
    InvalidDistribution,
}

/// Outcome of scoring one feature vector.  A label is always present;
/// confidence data only when the classifier could provide it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Prediction {
    Scored(ScoredPrediction),
    LabelOnly { label: Label, reason: ScoreError },
}

impl Prediction {
    pub fn label(&self) -> &str {
        match self {
            Prediction::Scored(scored) => &scored.label,
            Prediction::LabelOnly { label, .. } => label,
        }
    }

    pub fn confidence(&self) -> Option<f64> {
        match self {
            Prediction::Scored(scored) => Some(scored.confidence),
            Prediction::LabelOnly { .. } => None,
        }
    }

    /// Empty for label-only predictions.
    pub fn top_k(&self) -> &[RankedLabel] {
        match self {
            Prediction::Scored(scored) => &scored.top_k,
            Prediction::LabelOnly { .. } => &[],
        }
    }

    /// Empty for label-only predictions.
    pub fn classes(&self) -> &[Label] {
        match self {
            Prediction::Scored(scored) => &scored.classes,
            Prediction::LabelOnly { .. } => &[],
        }
    }

    pub fn probabilities(&self) -> Option<&[f64]> {
        match self {
            Prediction::Scored(scored) => Some(&scored.probabilities),
            Prediction::LabelOnly { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Scorer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceScorer {
    options: ScoringOptions,
}

impl ConfidenceScorer {
    /// `top_k` is clamped into `1..=MAX_TOP_K`.
    pub fn new(options: ScoringOptions) -> Self {
        Self {
            options: ScoringOptions {
                top_k: options.top_k.clamp(1, MAX_TOP_K),
            },
        }
    }

    /// Predict a label for `features` and attach confidence data.
    ///
    /// Fails only when the classifier cannot predict a label.  Any problem
    /// obtaining confidence yields [`Prediction::LabelOnly`].
    pub fn score<C: Classifier + ?Sized>(
        &self,
        classifier: &C,
        features: &FeatureVector,
    ) -> Result<Prediction> {
        let label = classifier
            .predict(features)
            .context("classifier failed to predict a label")?;

        match self.try_score(classifier, features, &label) {
            Ok(scored) => Ok(Prediction::Scored(scored)),
            Err(reason) => {
                log::warn!("Prediction {label:?} has no confidence: {reason}");
                Ok(Prediction::LabelOnly { label, reason })
            }
        }
    }

    fn try_score<C: Classifier + ?Sized>(
        &self,
        classifier: &C,
        features: &FeatureVector,
        label: &Label,
    ) -> Result<ScoredPrediction, ScoreError> {
        let classes = classifier.classes().to_vec();
        let (probabilities, source) = distribution(classifier, features)?;

        if probabilities.len() != classes.len() {
            return Err(ScoreError::LengthMismatch {
                expected: classes.len(),
                actual: probabilities.len(),
            });
        }
        if !is_distribution(&probabilities) {
            return Err(ScoreError::InvalidDistribution);
        }

        let index = index_map(&classes);
        let position = *index
            .get(label.as_str())
            .ok_or_else(|| ScoreError::UnknownLabel(label.clone()))?;

        Ok(ScoredPrediction {
            label: label.clone(),
            confidence: probabilities[position],
            top_k: top_k(&classes, &probabilities, self.options.top_k),
            classes,
            probabilities,
            source,
        })
    }
}

/// Probability per class: the classifier's own probabilities when it has
/// them, otherwise softmax over its margins.
pub fn distribution<C: Classifier + ?Sized>(
    classifier: &C,
    features: &FeatureVector,
) -> Result<(Vec<f64>, ProbabilitySource), ScoreError> {
    let failed = |e: anyhow::Error| ScoreError::Capability(format!("{e:#}"));

    if let Some(probabilities) = classifier.predict_proba(features) {
        return Ok((probabilities.map_err(failed)?, ProbabilitySource::Native));
    }
    if let Some(margins) = classifier.decision_function(features) {
        let margins = expand_binary_margin(margins.map_err(failed)?, classifier.classes().len());
        return Ok((softmax(&margins), ProbabilitySource::Softmax));
    }
    Err(ScoreError::Unsupported)
}

/// Numerically stable softmax: `exp(m - max) / Σ exp(m_j - max)`.
pub fn softmax(margins: &[f64]) -> Vec<f64> {
    let max = margins.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = margins.iter().map(|&m| (m - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

/// A two-class classifier's single margin `m` favours `classes[1]`; as
/// `[0, m]` its softmax is `[1 - σ(m), σ(m)]`.
fn expand_binary_margin(margins: Vec<f64>, n_classes: usize) -> Vec<f64> {
    if n_classes == 2 && margins.len() == 1 {
        vec![0.0, margins[0]]
    } else {
        margins
    }
}

fn is_distribution(probabilities: &[f64]) -> bool {
    let finite = probabilities.iter().all(|p| p.is_finite() && *p >= 0.0);
    finite && (probabilities.iter().sum::<f64>() - 1.0).abs() <= SUM_TOLERANCE
}

/// Position of each label; the first occurrence wins for duplicates.
fn index_map(classes: &[Label]) -> HashMap<&str, usize> {
    let mut index = HashMap::with_capacity(classes.len());
    for (i, class) in classes.iter().enumerate() {
        index.entry(class.as_str()).or_insert(i);
    }
    index
}

/// The `k` most probable classes, descending.  Equal probabilities keep
/// the order of `classes`.
pub fn top_k(classes: &[Label], probabilities: &[f64], k: usize) -> Vec<RankedLabel> {
    let mut order: Vec<usize> = (0..classes.len().min(probabilities.len())).collect();
    order.sort_by(|&a, &b| probabilities[b].total_cmp(&probabilities[a]));
    order
        .into_iter()
        .take(k)
        .map(|i| RankedLabel {
            label: classes[i].clone(),
            probability: probabilities[i],
        })
        .collect()
}
