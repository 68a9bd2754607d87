//! Pluggable similarity scoring between two answers.

use std::fmt;

use serde::{Serialize, Serializer};

pub mod embedding;
pub mod lexical;

pub use embedding::EmbeddingSimilarity;
pub use lexical::{LexicalSimilarity, lexical_similarity};

/// Marker reported when scores came from the lexical strategy.
pub const FALLBACK_MARKER: &str = "fallback";

/// Which strategy produced a run's scores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    Embedding { model_id: String },
    Lexical,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Embedding { model_id } => f.write_str(model_id),
            Self::Lexical => f.write_str(FALLBACK_MARKER),
        }
    }
}

impl Serialize for Strategy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A similarity in [0, 1], plus whether it came from a fallback path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scored {
    pub score: f64,
    pub degraded: bool,
}

impl Scored {
    pub fn exact(score: f64) -> Self {
        Self {
            score,
            degraded: false,
        }
    }
}

pub trait SimilarityStrategy: Send + Sync {
    fn strategy(&self) -> Strategy;

    /// Score `a` against `b`. Never fails; degenerate inputs score 0.0.
    fn similarity(&self, a: &str, b: &str) -> Scored;
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let (dot, na, nb) = a
        .iter()
        .zip(b.iter())
        .fold((0.0f32, 0.0f32, 0.0f32), |(d, aa, bb), (x, y)| {
            (d + (x * y), aa + (x * x), bb + (y * y))
        });

    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na.sqrt() * nb.sqrt())
    }
}
