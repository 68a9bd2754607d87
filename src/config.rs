use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};

pub const DEFAULT_THRESHOLD: f64 = 0.75;
pub const DEFAULT_MODEL_ID: &str = "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2";

/// Engine settings. Fixed for the lifetime of an [`crate::Evaluator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// Minimum `overall_score` for a pair to count as correct.
    pub similarity_threshold: f64,
    /// Try the embedding strategy first; lexical only when false.
    pub use_embedding: bool,
    /// Identifier of the embedding capability to request.
    pub embedding_model_id: String,
    /// Local directory holding the model named by `embedding_model_id`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model_dir: Option<PathBuf>,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_THRESHOLD,
            use_embedding: true,
            embedding_model_id: DEFAULT_MODEL_ID.to_string(),
            embedding_model_dir: None,
        }
    }
}

impl EvaluatorConfig {
    /// Read a JSON config file; absent fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            EvalError::Configuration(format!("cannot read config {}: {e}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            EvalError::Configuration(format!("cannot parse config {}: {e}", path.display()))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !self.similarity_threshold.is_finite()
            || !(0.0..=1.0).contains(&self.similarity_threshold)
        {
            return Err(EvalError::Configuration(format!(
                "similarity_threshold must be within [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if self.use_embedding && self.embedding_model_id.trim().is_empty() {
            return Err(EvalError::Configuration(
                "embedding_model_id must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
