use tracing::warn;

use super::{LexicalSimilarity, Scored, SimilarityStrategy, Strategy, cosine_similarity};
use crate::embed::EmbeddingProvider;
use crate::error::{EvalError, Result};
use crate::normalize::normalize;

/// Cosine similarity of sentence embeddings, clamped into [0, 1].
///
/// A failing provider or malformed vectors degrade that one pair to the
/// lexical strategy; the failure is logged, never returned.
pub struct EmbeddingSimilarity {
    model_id: String,
    provider: Box<dyn EmbeddingProvider>,
    fallback: LexicalSimilarity,
}

impl EmbeddingSimilarity {
    pub fn new(model_id: impl Into<String>, provider: Box<dyn EmbeddingProvider>) -> Self {
        Self {
            model_id: model_id.into(),
            provider,
            fallback: LexicalSimilarity,
        }
    }

    fn embedding_score(&self, core_a: &str, core_b: &str) -> Result<f64> {
        let vectors = self
            .provider
            .embed_batch(&[core_a, core_b])
            .map_err(|e| EvalError::EmbeddingUnavailable(format!("{e:#}")))?;

        let [a, b] = vectors.as_slice() else {
            return Err(EvalError::EmbeddingUnavailable(format!(
                "expected 2 vectors, got {}",
                vectors.len()
            )));
        };
        if a.is_empty() || a.len() != b.len() {
            return Err(EvalError::EmbeddingUnavailable(format!(
                "malformed vectors of length {} and {}",
                a.len(),
                b.len()
            )));
        }
        if a.iter().chain(b.iter()).any(|x| !x.is_finite()) {
            return Err(EvalError::EmbeddingUnavailable(
                "non-finite vector component".to_string(),
            ));
        }

        // Negative cosine carries no meaning for answer matching.
        Ok(f64::from(cosine_similarity(a, b)).clamp(0.0, 1.0))
    }
}

impl SimilarityStrategy for EmbeddingSimilarity {
    fn strategy(&self) -> Strategy {
        Strategy::Embedding {
            model_id: self.model_id.clone(),
        }
    }

    fn similarity(&self, a: &str, b: &str) -> Scored {
        let core_a = normalize(a);
        let core_b = normalize(b);

        if core_a.is_empty() || core_b.is_empty() {
            return Scored::exact(0.0);
        }
        if core_a == core_b {
            return Scored::exact(1.0);
        }

        match self.embedding_score(&core_a, &core_b) {
            Ok(score) => Scored::exact(score),
            Err(err) => {
                warn!(model = %self.model_id, error = %err, "embedding similarity failed, using lexical fallback");
                Scored {
                    score: self.fallback.similarity(a, b).score,
                    degraded: true,
                }
            }
        }
    }
}
