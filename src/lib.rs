//! Semantic answer evaluation.
//!
//! Scores generated answers against reference answers when exact string
//! equality is meaningless: answers are normalised to their core meaning,
//! compared by embedding cosine (or a lexical fallback), combined with a
//! completeness signal, and aggregated into a pass/fail report.

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod corpus;
pub mod embed;
pub mod error;
pub mod normalize;
pub mod output;
pub mod quality;
pub mod runner;
pub mod similarity;

pub use aggregate::{AggregateReport, Evaluator, ScoredPair};
pub use config::{DEFAULT_MODEL_ID, DEFAULT_THRESHOLD, EvaluatorConfig};
pub use corpus::{CorpusRecord, load_corpus, load_predictions};
pub use embed::{BertEmbeddingProvider, EmbeddingProvider, HashEmbeddingProvider, load_provider};
pub use error::{EvalError, Result};
pub use normalize::{extract_answer, normalize};
pub use quality::{AnswerPair, QualityReport, assess, completeness};
pub use similarity::{
    EmbeddingSimilarity, LexicalSimilarity, SimilarityStrategy, Strategy, cosine_similarity,
    lexical_similarity,
};
