//! Training and evaluation drivers.
//!
//! Dataset loading is timed separately from fitting and scoring: for small
//! datasets decoding images dominates wall-clock time and says nothing
//! about the classifier.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::classifier::{Classifier, Fit, ModelStore};
use crate::data::loader::DatasetLoader;
use crate::data::model::{Dataset, Label};

// ---------------------------------------------------------------------------
// Training
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub samples: usize,
    pub classes: usize,
    /// Time spent building the dataset, when the harness loaded it.
    pub load_duration: Option<Duration>,
    pub fit_duration: Duration,
}

/// Fit a classifier to `dataset` and hand it to `store`.
pub fn train<C, S>(dataset: &Dataset, params: &C::Params, store: &S) -> Result<(C, TrainingReport)>
where
    C: Fit,
    S: ModelStore<C> + ?Sized,
{
    log::info!("Training on {} samples with {params:?}", dataset.len());
    let started = Instant::now();
    let model = C::fit(dataset, params).context("fitting classifier")?;
    let fit_duration = started.elapsed();
    log::info!("Fit took {fit_duration:.2?}");

    store.save(&model).context("saving trained model")?;

    let report = TrainingReport {
        samples: dataset.len(),
        classes: model.classes().len(),
        load_duration: None,
        fit_duration,
    };
    Ok((model, report))
}

/// Loads a dataset directory and trains on it.
#[derive(Debug, Clone, Default)]
pub struct TrainingHarness {
    loader: DatasetLoader,
}

impl TrainingHarness {
    pub fn new(loader: DatasetLoader) -> Self {
        Self { loader }
    }

    pub fn run<C, S>(&self, root: &Path, params: &C::Params, store: &S) -> Result<(C, TrainingReport)>
    where
        C: Fit,
        S: ModelStore<C> + ?Sized,
    {
        let started = Instant::now();
        let dataset = self
            .loader
            .load(root)
            .with_context(|| format!("loading training data from {}", root.display()))?;
        let load_duration = started.elapsed();

        let (model, mut report) = train(&dataset, params, store)?;
        report.load_duration = Some(load_duration);
        Ok((model, report))
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassTally {
    pub correct: usize,
    pub total: usize,
}

impl ClassTally {
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

/// A sample whose predicted label differs from its directory label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Misclassification {
    pub path: PathBuf,
    pub expected: Label,
    pub predicted: Label,
}

#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub samples: usize,
    pub correct: usize,
    /// Share of samples predicted correctly, in `[0, 1]`.
    pub accuracy: f64,
    /// `1 - accuracy`.
    pub error_rate: f64,
    pub load_duration: Option<Duration>,
    pub score_duration: Duration,
    pub per_class: BTreeMap<Label, ClassTally>,
    pub misclassified: Vec<Misclassification>,
}

impl EvaluationReport {
    /// Write the misclassified samples as CSV with a header row.
    pub fn write_misclassified_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("creating {}", path.display()))?;
        if self.misclassified.is_empty() {
            writer.write_record(["path", "expected", "predicted"])?;
        }
        for row in &self.misclassified {
            writer.serialize(row).context("writing CSV row")?;
        }
        writer.flush().context("flushing CSV")?;
        Ok(())
    }
}

/// Predict every row of `dataset` and compare with its label.
pub fn evaluate<C: Classifier + ?Sized>(classifier: &C, dataset: &Dataset) -> Result<EvaluationReport> {
    if dataset.is_empty() {
        bail!("cannot evaluate on an empty dataset");
    }

    let started = Instant::now();
    let mut correct = 0;
    let mut per_class: BTreeMap<Label, ClassTally> = BTreeMap::new();
    let mut misclassified = Vec::new();

    for (row, (features, expected)) in dataset.rows().enumerate() {
        let predicted = classifier
            .predict(features)
            .with_context(|| format!("predicting row {row}"))?;
        let tally = per_class.entry(expected.clone()).or_default();
        tally.total += 1;
        if &predicted == expected {
            correct += 1;
            tally.correct += 1;
        } else {
            misclassified.push(Misclassification {
                path: dataset.sources.get(row).cloned().unwrap_or_default(),
                expected: expected.clone(),
                predicted,
            });
        }
    }
    let score_duration = started.elapsed();

    let accuracy = correct as f64 / dataset.len() as f64;
    log::info!(
        "Scored {} samples in {score_duration:.2?}: accuracy {accuracy:.6}",
        dataset.len()
    );

    Ok(EvaluationReport {
        samples: dataset.len(),
        correct,
        accuracy,
        error_rate: 1.0 - accuracy,
        load_duration: None,
        score_duration,
        per_class,
        misclassified,
    })
}

/// Loads a dataset directory and evaluates a classifier on it.
#[derive(Debug, Clone, Default)]
pub struct EvaluationHarness {
    loader: DatasetLoader,
}

impl EvaluationHarness {
    pub fn new(loader: DatasetLoader) -> Self {
        Self { loader }
    }

    pub fn run<C: Classifier + ?Sized>(&self, root: &Path, classifier: &C) -> Result<EvaluationReport> {
        let started = Instant::now();
        let dataset = self
            .loader
            .load(root)
            .with_context(|| format!("loading test data from {}", root.display()))?;
        let load_duration = started.elapsed();

        let mut report = evaluate(classifier, &dataset)?;
        report.load_duration = Some(load_duration);
        Ok(report)
    }
}
