//! Corpus-level scoring: the [`Evaluator`] engine and its [`AggregateReport`].

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::EvaluatorConfig;
use crate::embed::{self, EmbeddingProvider};
use crate::error::{EvalError, Result};
use crate::quality::{AnswerPair, QualityReport, assess};
use crate::similarity::{EmbeddingSimilarity, LexicalSimilarity, SimilarityStrategy, Strategy};

/// One scored pair as it appears in the report details.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredPair {
    #[serde(flatten)]
    pub pair: AnswerPair,
    #[serde(flatten)]
    pub report: QualityReport,
    pub threshold: f64,
    /// Similarity for this pair came from the lexical fallback although the
    /// run was embedding-based.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateReport {
    pub accuracy_percent: f64,
    pub avg_semantic_similarity: f64,
    pub avg_overall_score: f64,
    pub total: usize,
    pub correct: usize,
    pub threshold: f64,
    pub strategy_used: Strategy,
    /// Pairs that fell back to lexical scoring mid-run.
    pub degraded: usize,
    pub details: Vec<ScoredPair>,
}

impl AggregateReport {
    fn from_details(details: Vec<ScoredPair>, threshold: f64, strategy_used: Strategy) -> Self {
        let total = details.len();
        let correct = details.iter().filter(|d| d.report.is_correct).count();
        let degraded = details.iter().filter(|d| d.degraded).count();

        let (accuracy_percent, avg_semantic_similarity, avg_overall_score) = if total == 0 {
            (0.0, 0.0, 0.0)
        } else {
            let n = total as f64;
            let semantic: f64 = details.iter().map(|d| d.report.semantic_similarity).sum();
            let overall: f64 = details.iter().map(|d| d.report.overall_score).sum();
            (100.0 * correct as f64 / n, semantic / n, overall / n)
        };

        Self {
            accuracy_percent,
            avg_semantic_similarity,
            avg_overall_score,
            total,
            correct,
            threshold,
            strategy_used,
            degraded,
            details,
        }
    }

    /// Headline metrics keyed the way downstream summarisers look them up.
    pub fn summary(&self) -> BTreeMap<&'static str, f64> {
        BTreeMap::from([
            ("accuracy", self.accuracy_percent),
            ("avg_semantic_similarity", self.avg_semantic_similarity),
            ("avg_overall_score", self.avg_overall_score),
        ])
    }
}

/// The evaluation engine. Holds no per-run state; every call is independent.
pub struct Evaluator {
    config: EvaluatorConfig,
    strategy: Box<dyn SimilarityStrategy>,
}

impl Evaluator {
    /// Build the engine, loading the embedding capability when enabled.
    /// A provider that fails to load leaves the engine lexical-only; an
    /// invalid configuration is rejected.
    pub fn new(config: EvaluatorConfig) -> Result<Self> {
        if !config.use_embedding {
            return Self::lexical(config);
        }
        config.validate()?;

        match embed::load_provider(&config) {
            Ok(provider) => Self::with_provider(config, provider),
            Err(err) => {
                let err = EvalError::EmbeddingUnavailable(format!("{err:#}"));
                warn!(
                    model = %config.embedding_model_id,
                    error = %err,
                    "embedding model could not be loaded, using lexical similarity"
                );
                Self::lexical(config)
            }
        }
    }

    /// Build the engine around an already constructed provider.
    pub fn with_provider(
        config: EvaluatorConfig,
        provider: Box<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        if !config.use_embedding {
            return Self::lexical(config);
        }
        config.validate()?;
        let strategy = EmbeddingSimilarity::new(config.embedding_model_id.clone(), provider);
        Ok(Self {
            config,
            strategy: Box::new(strategy),
        })
    }

    pub fn lexical(config: EvaluatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            strategy: Box::new(LexicalSimilarity),
        })
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy.strategy()
    }

    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        self.strategy.similarity(a, b).score
    }

    pub fn assess(&self, prediction: &str, reference: &str) -> QualityReport {
        self.score_pair(prediction, reference).report
    }

    fn score_pair(&self, prediction: &str, reference: &str) -> ScoredPair {
        let threshold = self.config.similarity_threshold;
        let assessment = assess(self.strategy.as_ref(), prediction, reference, threshold);
        ScoredPair {
            pair: AnswerPair::new(prediction, reference),
            report: assessment.report,
            threshold,
            degraded: assessment.degraded,
        }
    }

    /// Score every prediction against the reference at the same index.
    ///
    /// Pairs are scored in parallel; `details` keeps input order.
    pub fn score<P, R>(&self, predictions: &[P], references: &[R]) -> Result<AggregateReport>
    where
        P: AsRef<str> + Sync,
        R: AsRef<str> + Sync,
    {
        if predictions.len() != references.len() {
            return Err(EvalError::LengthMismatch {
                predictions: predictions.len(),
                references: references.len(),
            });
        }

        let details: Vec<ScoredPair> = predictions
            .par_iter()
            .zip(references.par_iter())
            .enumerate()
            .map(|(index, (prediction, reference))| {
                let scored = self.score_pair(prediction.as_ref(), reference.as_ref());
                debug!(
                    index,
                    overall = scored.report.overall_score,
                    correct = scored.report.is_correct,
                    degraded = scored.degraded,
                    "scored pair"
                );
                scored
            })
            .collect();

        let report = AggregateReport::from_details(
            details,
            self.config.similarity_threshold,
            self.strategy(),
        );

        if report.degraded > 0 {
            warn!(
                degraded = report.degraded,
                total = report.total,
                "some pairs fell back to lexical similarity"
            );
        }
        info!(
            strategy = %report.strategy_used,
            total = report.total,
            correct = report.correct,
            accuracy = report.accuracy_percent,
            "evaluation finished"
        );

        Ok(report)
    }

    pub fn score_pairs(&self, pairs: &[AnswerPair]) -> AggregateReport {
        let details: Vec<ScoredPair> = pairs
            .par_iter()
            .map(|p| self.score_pair(&p.prediction, &p.reference))
            .collect();
        AggregateReport::from_details(details, self.config.similarity_threshold, self.strategy())
    }
}
