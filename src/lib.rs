//! Digit image classification with calibrated confidence.
//!
//! ```text
//!  image file ──► vectorize ──► FeatureVector ──► Classifier ──► ConfidenceScorer ──► Prediction
//!  root/<label>/* ──► DatasetLoader ──► Dataset ──► harness::{train, evaluate}
//! ```

pub mod classifier;
pub mod config;
pub mod data;
pub mod error;
pub mod harness;
pub mod scoring;

pub use classifier::{Classifier, Fit, JsonModelStore, Model, ModelParams, ModelStore};
pub use config::PipelineConfig;
pub use data::loader::{DatasetLoader, LoaderOptions};
pub use data::model::{Dataset, FeatureVector, Label, FEATURE_LEN};
pub use data::vectorize::{vectorize_image, vectorize_path, Polarity, VectorizeOptions};
pub use error::PipelineError;
pub use harness::{evaluate, train, EvaluationHarness, EvaluationReport, TrainingHarness, TrainingReport};
pub use scoring::{ConfidenceScorer, Prediction, ScoreError, ScoredPrediction, ScoringOptions};
