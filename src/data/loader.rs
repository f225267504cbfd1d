use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::model::{Dataset, Label, Sample};
use super::vectorize::{vectorize_path, VectorizeOptions};
use crate::error::PipelineError;

/// Extensions accepted when assembling a training or evaluation dataset.
pub const DATASET_EXTENSIONS: &[&str] = &["png"];

/// Every extension the inference path accepts.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Which files the loader picks up and how it walks them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderOptions {
    /// File extensions (without the dot), compared case-insensitively.
    pub extensions: Vec<String>,
    /// Vectorize files on the rayon thread pool.  Row order is unchanged.
    pub parallel: bool,
    /// Sort directory entries by name instead of using listing order.
    pub sorted: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            extensions: DATASET_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            parallel: false,
            sorted: false,
        }
    }
}

impl LoaderOptions {
    /// Options accepting every image format the inference path reads.
    pub fn all_images() -> Self {
        Self {
            extensions: IMAGE_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Whether `path` carries one of the configured extensions.
    pub fn matches(&self, path: &Path) -> bool {
        has_extension(path, &self.extensions)
    }
}

fn has_extension<S: AsRef<str>>(path: &Path, extensions: &[S]) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    extensions
        .iter()
        .any(|candidate| candidate.as_ref().eq_ignore_ascii_case(ext))
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// A matched image file and the label taken from its parent directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledFile {
    pub path: PathBuf,
    pub label: Label,
}

/// Builds a [`Dataset`] from a `root/<label>/<file>.<ext>` tree.
#[derive(Debug, Clone, Default)]
pub struct DatasetLoader {
    pub vectorize: VectorizeOptions,
    pub options: LoaderOptions,
}

impl DatasetLoader {
    pub fn new(vectorize: VectorizeOptions, options: LoaderOptions) -> Self {
        Self { vectorize, options }
    }

    /// Vectorize every matching file under `root`.
    ///
    /// Rows follow traversal order: label directories in listing order, and
    /// files in listing order within each.  A single undecodable file fails
    /// the whole load.
    pub fn load(&self, root: &Path) -> Result<Dataset, PipelineError> {
        let started = Instant::now();
        let files = self.list_files(root)?;
        if files.is_empty() {
            return Err(PipelineError::EmptyDataset {
                root: root.to_path_buf(),
                extensions: self.options.extensions.clone(),
            });
        }

        let samples: Vec<Sample> = if self.options.parallel {
            files
                .into_par_iter()
                .map(|file| self.read_sample(file))
                .collect::<Result<Vec<_>, PipelineError>>()?
        } else {
            files
                .into_iter()
                .map(|file| self.read_sample(file))
                .collect::<Result<Vec<_>, PipelineError>>()?
        };

        let dataset = Dataset::from_samples(samples);
        log::info!(
            "Loaded {} samples across {} labels from {} in {:.2?}",
            dataset.len(),
            dataset.distinct_labels().len(),
            root.display(),
            started.elapsed()
        );
        Ok(dataset)
    }

    /// Enumerate the files [`load`](Self::load) would read, without decoding
    /// them.
    pub fn list_files(&self, root: &Path) -> Result<Vec<LabeledFile>, PipelineError> {
        if !root.is_dir() {
            return Err(PipelineError::DirectoryNotFound(root.to_path_buf()));
        }

        let mut files = Vec::new();
        for label_dir in read_entries(root, self.options.sorted)? {
            if !label_dir.is_dir() {
                log::debug!("Skipping non-directory entry {}", label_dir.display());
                continue;
            }
            let Some(label) = label_dir.file_name().map(|n| n.to_string_lossy().into_owned())
            else {
                continue;
            };

            let before = files.len();
            for path in read_entries(&label_dir, self.options.sorted)? {
                if path.is_file() && self.options.matches(&path) {
                    files.push(LabeledFile {
                        path,
                        label: label.clone(),
                    });
                }
            }
            log::debug!("Label {label:?}: {} files", files.len() - before);
        }
        Ok(files)
    }

    fn read_sample(&self, file: LabeledFile) -> Result<Sample, PipelineError> {
        let features = vectorize_path(&file.path, &self.vectorize)?;
        Ok(Sample {
            features,
            label: file.label,
            source: file.path,
        })
    }
}

/// Every image file at any depth under `root`, with any of `extensions`.
pub fn collect_image_files<S: AsRef<str>>(
    root: &Path,
    extensions: &[S],
) -> Result<Vec<PathBuf>, PipelineError> {
    if !root.is_dir() {
        return Err(PipelineError::DirectoryNotFound(root.to_path_buf()));
    }
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let io_err = |source: std::io::Error| PipelineError::Io {
            path: dir.clone(),
            source,
        };
        let mut entries = fs::read_dir(&dir)
            .map_err(io_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(io_err)?;
        entries.sort_by_key(|entry| entry.path());

        for entry in entries {
            // Symlinks are listed but never descended into.
            let file_type = entry.file_type().map_err(io_err)?;
            let path = entry.path();
            if file_type.is_dir() {
                pending.push(path);
            } else if has_extension(&path, extensions) {
                found.push(path);
            }
        }
    }
    Ok(found)
}

fn read_entries(dir: &Path, sorted: bool) -> Result<Vec<PathBuf>, PipelineError> {
    let io_err = |source: std::io::Error| PipelineError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = fs::read_dir(dir)
        .map_err(io_err)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_err)?;
    if sorted {
        entries.sort();
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_match_ignores_case() {
        let options = LoaderOptions::all_images();
        assert!(options.matches(Path::new("a/3/x.PNG")));
        assert!(options.matches(Path::new("a/3/x.Jpeg")));
        assert!(options.matches(Path::new("a/3/x.bmp")));
        assert!(!options.matches(Path::new("a/3/x.gif")));
        assert!(!options.matches(Path::new("a/3/png")));
    }

    #[test]
    fn dataset_defaults_accept_png_only() {
        let options = LoaderOptions::default();
        assert!(options.matches(Path::new("7/001.png")));
        assert!(!options.matches(Path::new("7/001.jpg")));
        assert!(!options.parallel);
        assert!(!options.sorted);
    }

    #[test]
    fn missing_root_is_reported() {
        let loader = DatasetLoader::default();
        let err = loader.load(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, PipelineError::DirectoryNotFound(_)));
    }
}
