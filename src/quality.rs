use serde::{Deserialize, Serialize};

use crate::normalize::normalize;
use crate::similarity::SimilarityStrategy;

pub const SEMANTIC_WEIGHT: f64 = 0.7;
pub const COMPLETENESS_WEIGHT: f64 = 0.3;

/// One generated answer and the reference it is judged against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerPair {
    pub prediction: String,
    pub reference: String,
}

impl AnswerPair {
    pub fn new(prediction: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            prediction: prediction.into(),
            reference: reference.into(),
        }
    }
}

/// Per-pair scores, rounded to three decimals.
///
/// `accuracy` mirrors `semantic_similarity` for reporting compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityReport {
    pub semantic_similarity: f64,
    pub completeness: f64,
    pub accuracy: f64,
    pub overall_score: f64,
    pub is_correct: bool,
}

impl QualityReport {
    /// Combine raw component scores. The weighted overall score and the
    /// verdict are computed on the unrounded components; every field is
    /// rounded only when the report is built.
    pub fn new(similarity: f64, completeness: f64, threshold: f64) -> Self {
        let similarity = similarity.clamp(0.0, 1.0);
        let completeness = completeness.clamp(0.0, 1.0);
        let overall = SEMANTIC_WEIGHT * similarity + COMPLETENESS_WEIGHT * completeness;
        let semantic_similarity = round3(similarity);

        Self {
            semantic_similarity,
            completeness: round3(completeness),
            accuracy: semantic_similarity,
            overall_score: round3(overall),
            is_correct: overall >= threshold,
        }
    }
}

/// A report plus whether its similarity came from a fallback path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assessment {
    pub report: QualityReport,
    pub degraded: bool,
}

pub fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

/// Character-length ratio of prediction to reference core meaning, capped
/// at 1.0. A crude signal that the answer was not truncated.
pub fn completeness(prediction: &str, reference: &str) -> f64 {
    let reference_len = normalize(reference).chars().count();
    if reference_len == 0 {
        return 0.0;
    }
    let prediction_len = normalize(prediction).chars().count();
    (prediction_len as f64 / reference_len as f64).min(1.0)
}

pub fn assess<S>(strategy: &S, prediction: &str, reference: &str, threshold: f64) -> Assessment
where
    S: SimilarityStrategy + ?Sized,
{
    let scored = strategy.similarity(prediction, reference);
    let report = QualityReport::new(
        scored.score,
        completeness(prediction, reference),
        threshold,
    );
    Assessment {
        report,
        degraded: scored.degraded,
    }
}
