use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rand::Rng;

use digit_lens::classifier::KnnParams;
use digit_lens::data::loader::{collect_image_files, IMAGE_EXTENSIONS};
use digit_lens::data::model::GRID_SIZE;
use digit_lens::{
    vectorize_path, ConfidenceScorer, DatasetLoader, EvaluationHarness, FeatureVector,
    JsonModelStore, Model, ModelParams, ModelStore, PipelineConfig, Prediction, TrainingHarness,
};

/// Handwritten digit classifier with confidence scores
#[derive(Parser)]
#[command(name = "digit-lens")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Pipeline configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Algorithm {
    /// Nearest class centroid (margins + softmax)
    Centroid,
    /// k-nearest neighbours (native probabilities)
    Knn,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a classifier on a <label>/<image> directory tree
    Train {
        /// Training data root
        #[arg(short, long, default_value = "mnist_train")]
        data: PathBuf,

        /// Where to write the trained model
        #[arg(short, long, default_value = "digits.model")]
        model: PathBuf,

        #[arg(short, long, value_enum, default_value = "knn")]
        algorithm: Algorithm,

        /// Neighbours voting in k-nearest mode
        #[arg(short, long, default_value_t = 3)]
        k: usize,
    },
    /// Measure accuracy on a labeled directory tree
    Evaluate {
        /// Test data root
        #[arg(short, long, default_value = "mnist_test")]
        data: PathBuf,

        #[arg(short, long, default_value = "digits.model")]
        model: PathBuf,

        /// Write misclassified samples to this CSV file
        #[arg(long)]
        misclassified: Option<PathBuf>,
    },
    /// Classify one image and report its confidence
    Predict {
        /// Image to classify
        #[arg(required_unless_present = "random", conflicts_with = "random")]
        image: Option<PathBuf>,

        /// Pick a random image from anywhere under this directory
        #[arg(long)]
        random: Option<PathBuf>,

        #[arg(short, long, default_value = "digits.model")]
        model: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Print the binarized 28x28 grid the classifier sees
        #[arg(long)]
        show_grid: bool,
    },
    /// Print the default configuration
    ShowConfig,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Train {
            data,
            model,
            algorithm,
            k,
        } => {
            let params = match algorithm {
                Algorithm::Centroid => ModelParams::NearestCentroid,
                Algorithm::Knn => ModelParams::KNearest(KnnParams { k }),
            };
            run_train(&config, &data, &model, &params)
        }
        Commands::Evaluate {
            data,
            model,
            misclassified,
        } => run_evaluate(&config, &data, &model, misclassified.as_deref()),
        Commands::Predict {
            image,
            random,
            model,
            json,
            show_grid,
        } => {
            let image = match (image, random) {
                (Some(image), _) => image,
                (None, Some(dir)) => pick_random_image(&dir)?,
                (None, None) => bail!("either an image or --random <dir> is required"),
            };
            run_predict(&config, &image, &model, json, show_grid)
        }
        Commands::ShowConfig => {
            println!("{}", PipelineConfig::default().to_json()?);
            Ok(())
        }
    }
}

fn loader(config: &PipelineConfig) -> DatasetLoader {
    DatasetLoader::new(config.vectorize, config.loader.clone())
}

fn run_train(config: &PipelineConfig, data: &Path, model_path: &Path, params: &ModelParams) -> Result<()> {
    println!("Training on {}, please wait", data.display());
    println!("Parameters: {params:?}");

    let store = JsonModelStore::new(model_path);
    let (model, report): (Model, _) = TrainingHarness::new(loader(config)).run(data, params, &store)?;

    if let Some(load) = report.load_duration {
        println!("Loaded {} samples in {:.2}s", report.samples, load.as_secs_f64());
    }
    println!("Model training took {:.2}s", report.fit_duration.as_secs_f64());
    println!(
        "Saved {} model ({} classes) to {}",
        model.algorithm(),
        report.classes,
        store.path().display()
    );
    Ok(())
}

fn run_evaluate(
    config: &PipelineConfig,
    data: &Path,
    model_path: &Path,
    misclassified: Option<&Path>,
) -> Result<()> {
    let started = Instant::now();
    let model = ModelStore::<Model>::load(&JsonModelStore::new(model_path))?;
    let report = EvaluationHarness::new(loader(config)).run(data, &model)?;

    println!(
        "Test set dimensions: ({}, {}), labels: {}",
        report.samples,
        digit_lens::FEATURE_LEN,
        report.samples
    );
    if let Some(load) = report.load_duration {
        println!("Loading took {:.6}s", load.as_secs_f64());
    }
    println!("Scoring took {:.6}s", report.score_duration.as_secs_f64());
    println!("Accuracy: {:.6}", report.accuracy);
    println!("Error rate: {:.6}", report.error_rate);
    for (label, tally) in &report.per_class {
        println!("  {label}: {}/{} ({:.4})", tally.correct, tally.total, tally.accuracy());
    }
    println!("Total time {:.6}s", started.elapsed().as_secs_f64());

    if let Some(path) = misclassified {
        report.write_misclassified_csv(path)?;
        println!("Wrote {} misclassified samples to {}", report.misclassified.len(), path.display());
    }
    Ok(())
}

fn run_predict(
    config: &PipelineConfig,
    image: &Path,
    model_path: &Path,
    json: bool,
    show_grid: bool,
) -> Result<()> {
    let model = ModelStore::<Model>::load(&JsonModelStore::new(model_path))?;
    let features = vectorize_path(image, &config.vectorize)?;
    let prediction = ConfidenceScorer::new(config.scoring)
        .score(&model, &features)
        .with_context(|| format!("classifying {}", image.display()))?;

    if show_grid {
        print!("{}", render_grid(&features));
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&prediction)?);
        return Ok(());
    }

    println!("Image: {}", image.display());
    match &prediction {
        Prediction::Scored(scored) => {
            let ranked: Vec<String> = scored
                .top_k
                .iter()
                .map(|r| format!("{}:{:.4}", r.label, r.probability))
                .collect();
            println!(
                "Result: {}  Confidence: {:.4}  Top-{}: {}",
                scored.label,
                scored.confidence,
                ranked.len(),
                ranked.join(", ")
            );
        }
        Prediction::LabelOnly { label, .. } => println!("Result: {label}"),
    }
    Ok(())
}

fn pick_random_image(dir: &Path) -> Result<PathBuf> {
    let files = collect_image_files(dir, IMAGE_EXTENSIONS)?;
    if files.is_empty() {
        bail!("no images found under {}", dir.display());
    }
    let idx = rand::rng().random_range(0..files.len());
    Ok(files[idx].clone())
}

fn render_grid(features: &FeatureVector) -> String {
    let mut out = String::new();
    for row in features.as_slice().chunks(GRID_SIZE as usize) {
        out.extend(row.iter().map(|&v| if v > 0.0 { '#' } else { '.' }));
        out.push('\n');
    }
    out
}
