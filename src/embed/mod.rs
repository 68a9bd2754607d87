use anyhow::{Result, bail};
use tracing::info;

use crate::config::EvaluatorConfig;
use crate::normalize::words;

pub mod bert;

pub use bert::BertEmbeddingProvider;

/// Maps text to fixed-length vectors. Shared across scoring threads.
pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts in one call. The output is index-aligned with `texts`.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

impl EmbeddingProvider for Box<dyn EmbeddingProvider> {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        (**self).embed(text)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        (**self).embed_batch(texts)
    }
}

pub const HASH_MODEL_ID: &str = "hash";
pub const DEFAULT_HASH_DIM: usize = 768;

/// Bag-of-words feature hashing. Deterministic and model-free, useful as a
/// stand-in provider and in tests.
#[derive(Debug, Clone)]
pub struct HashEmbeddingProvider {
    dim: usize,
}

impl HashEmbeddingProvider {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(8) }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }
}

impl Default for HashEmbeddingProvider {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_DIM)
    }
}

impl EmbeddingProvider for HashEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0f32; self.dim];
        let lowered = text.to_lowercase();

        for token in words(&lowered) {
            // FNV-1a
            let mut h: u64 = 1469598103934665603;
            for b in token.as_bytes() {
                h ^= *b as u64;
                h = h.wrapping_mul(1099511628211);
            }
            v[(h as usize) % self.dim] += 1.0;
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }

        Ok(v)
    }
}

/// Resolve the provider named by `config.embedding_model_id`.
///
/// `hash` / `hash:<dim>` need nothing on disk; any other id is loaded as a
/// BERT-family encoder from `config.embedding_model_dir`.
pub fn load_provider(config: &EvaluatorConfig) -> Result<Box<dyn EmbeddingProvider>> {
    let id = config.embedding_model_id.as_str();

    if let Some(rest) = id.strip_prefix(HASH_MODEL_ID) {
        let dim = match rest.strip_prefix(':') {
            Some(n) => n
                .parse::<usize>()
                .map_err(|_| anyhow::anyhow!("invalid hash dimension in model id '{id}'"))?,
            None if rest.is_empty() => DEFAULT_HASH_DIM,
            None => bail!("unknown embedding model id '{id}'"),
        };
        info!(model = id, dim, "using hash embedding provider");
        return Ok(Box::new(HashEmbeddingProvider::new(dim)));
    }

    let Some(dir) = config.embedding_model_dir.as_deref() else {
        bail!("no model directory configured for '{id}'");
    };
    let provider = BertEmbeddingProvider::load(dir)?;
    info!(model = id, dir = %dir.display(), "loaded embedding model");
    Ok(Box::new(provider))
}
