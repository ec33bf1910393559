//! Engine configuration.
//!
//! Every field has a default, so an empty JSON object (or no file at all) is
//! a valid configuration. The CLI layers its flags and `ANCHORFIT_*`
//! environment variables on top.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;

/// Terminal decision policy once the attempt budget is spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecisionStrategy {
    /// Retry up to the budget; accept only a covered candidate at or above
    /// baseline, otherwise roll back to the original text.
    CoverageRollback,
    /// Score a fixed set of independent candidates and keep the best one,
    /// even if it is below baseline.
    BestOfN,
}

/// Which generator drives the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GeneratorKind {
    Deterministic,
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub strategy: DecisionStrategy,
    pub generator: GeneratorKind,
    pub max_attempts: u32,
    /// Worker count for batch runs; bounded by what the model servers accept.
    pub workers: usize,
    pub batch: BatchConfig,
    pub generation: GenerationConfig,
    pub embedding: EmbeddingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strategy: DecisionStrategy::CoverageRollback,
            generator: GeneratorKind::Model,
            max_attempts: 3,
            workers: 4,
            batch: BatchConfig::default(),
            generation: GenerationConfig::default(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load a JSON config file. Missing keys take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        info!(path = %path.display(), "loaded engine config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be at least 1".into()));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.batch.band.min > self.batch.band.max {
            return Err(ConfigError::Invalid(format!(
                "near-miss band is inverted: [{}, {}]",
                self.batch.band.min, self.batch.band.max
            )));
        }
        if self.generation.timeout_secs == 0 {
            return Err(ConfigError::Invalid("generation timeout must be positive".into()));
        }
        Ok(())
    }
}

/// Inclusive similarity range in which refinement is applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NearMissBand {
    pub min: f64,
    pub max: f64,
}

impl Default for NearMissBand {
    fn default() -> Self {
        Self { min: 0.65, max: 0.85 }
    }
}

impl NearMissBand {
    pub fn contains(&self, score: f64) -> bool {
        score >= self.min && score <= self.max
    }
}

/// Input column names of the upstream batch file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub tag: String,
    pub content: String,
    pub anchor: String,
    pub similarity: String,
    pub status: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            tag: "tag".into(),
            content: "content".into(),
            anchor: "anchor".into(),
            similarity: "similarity".into(),
            status: "status".into(),
        }
    }
}

impl ColumnNames {
    pub fn all(&self) -> [&str; 5] {
        [
            self.tag.as_str(),
            self.content.as_str(),
            self.anchor.as_str(),
            self.similarity.as_str(),
            self.status.as_str(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub band: NearMissBand,
    /// Status label (compared case- and whitespace-insensitively) of rows
    /// eligible for refinement.
    pub compatible_status: String,
    pub columns: ColumnNames,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            band: NearMissBand::default(),
            compatible_status: "compatible".into(),
            columns: ColumnNames::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub host: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// JSON field of the model reply that holds the rewritten text.
    pub reply_field: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:11434".into(),
            model: "gemma3:4b".into(),
            temperature: 0.2,
            timeout_secs: 120,
            reply_field: "improved_text".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Directory holding `model.onnx` and `tokenizer.json`.
    pub model_dir: PathBuf,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models/all-MiniLM-L6-v2"),
        }
    }
}
