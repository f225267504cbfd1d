/// Data layer: feature vectors, vectorization, and dataset loading.
///
/// Architecture:
/// ```text
///  root/<label>/<file>.png
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  walk label directories → LabeledFile list
///   └──────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ vectorize  │  grayscale → 28×28 → polarity → binarize → 784 values
///   └───────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ Dataset   │  Vec<FeatureVector> + parallel labels
///   └──────────┘
/// ```

pub mod loader;
pub mod model;
pub mod vectorize;
