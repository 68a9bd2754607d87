use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvalError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Malformed corpus line {}:{line}: {source}", path.display())]
    MalformedCorpusLine {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error(
        "predictions and references have different length ({predictions} vs {references})"
    )]
    LengthMismatch { predictions: usize, references: usize },

    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Invalid argument: {0}")]
    InvalidArg(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EvalError>;
