use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Where trained classifiers are saved to and loaded from.
pub trait ModelStore<C> {
    fn save(&self, model: &C) -> Result<()>;
    fn load(&self) -> Result<C>;
}

/// Stores a serde-serializable model as a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonModelStore {
    path: PathBuf,
}

impl JsonModelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<C: Serialize + DeserializeOwned> ModelStore<C> for JsonModelStore {
    fn save(&self, model: &C) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let file = File::create(&self.path)
            .with_context(|| format!("creating model file {}", self.path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, model).context("serializing model")?;
        writer.flush().context("writing model file")?;
        log::info!("Saved model to {}", self.path.display());
        Ok(())
    }

    fn load(&self) -> Result<C> {
        let file = File::open(&self.path)
            .with_context(|| format!("model file not found: {}", self.path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing model file {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_mentions_path() {
        let store = JsonModelStore::new("/nonexistent/dir/digits.model");
        let err = ModelStore::<Vec<u32>>::load(&store).unwrap_err();
        assert!(format!("{err:#}").contains("digits.model"));
    }
}
