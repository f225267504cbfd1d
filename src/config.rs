use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::loader::LoaderOptions;
use crate::data::vectorize::VectorizeOptions;
use crate::scoring::{ScoringOptions, MAX_TOP_K};

/// Settings for the whole pipeline.  Every field has a default, so a
/// config file only needs the keys it changes:
///
/// ```json
/// { "vectorize": { "polarity": "as_is" }, "loader": { "parallel": true } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub vectorize: VectorizeOptions,
    pub loader: LoaderOptions,
    pub scoring: ScoringOptions,
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        if !(1..=MAX_TOP_K).contains(&config.scoring.top_k) {
            anyhow::bail!(
                "scoring.top_k must be between 1 and {MAX_TOP_K}, got {}",
                config.scoring.top_k
            );
        }
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
