use std::collections::BTreeMap;
use std::io::{self, Write};
use std::time::Duration;

use serde::Serialize;

use crate::aggregate::AggregateReport;
use crate::error::{EvalError, Result};
use crate::quality::{AnswerPair, QualityReport};
use crate::similarity::Strategy;

const FORMATS: &[&str] = &["text", "json"];

pub fn check_format(format: &str) -> std::result::Result<(), String> {
    if FORMATS.contains(&format) {
        Ok(())
    } else {
        Err(format!("Unknown output format: {format}"))
    }
}

pub fn print_report(
    format: &str,
    report: &AggregateReport,
    elapsed: Duration,
    details: bool,
) -> Result<()> {
    let mut out = io::stdout().lock();
    match format {
        "text" => write_report_text(&mut out, report, elapsed, details),
        "json" => write_report_json(&mut out, report, elapsed),
        other => Err(EvalError::InvalidArg(format!(
            "Unknown output format: {other}"
        ))),
    }
}

pub fn print_assessment(
    format: &str,
    pair: &AnswerPair,
    report: &QualityReport,
    threshold: f64,
    strategy: &Strategy,
) -> Result<()> {
    let mut out = io::stdout().lock();
    match format {
        "text" => {
            writeln!(out, "Strategy:            {strategy}")?;
            writeln!(out, "Semantic similarity: {:.3}", report.semantic_similarity)?;
            writeln!(out, "Completeness:        {:.3}", report.completeness)?;
            writeln!(out, "Accuracy:            {:.3}", report.accuracy)?;
            writeln!(
                out,
                "Overall score:       {:.3} (threshold {threshold})",
                report.overall_score
            )?;
            writeln!(out, "Correct:             {}", report.is_correct)?;
            Ok(())
        }
        "json" => {
            let json = JsonAssessment {
                pair,
                report,
                threshold,
                strategy_used: strategy,
            };
            writeln!(out, "{}", serde_json::to_string_pretty(&json)?)?;
            Ok(())
        }
        other => Err(EvalError::InvalidArg(format!(
            "Unknown output format: {other}"
        ))),
    }
}

fn write_report_text(
    out: &mut impl Write,
    report: &AggregateReport,
    elapsed: Duration,
    details: bool,
) -> Result<()> {
    if report.degraded > 0 {
        writeln!(
            out,
            "Strategy:   {} ({} of {} pairs fell back to lexical)",
            report.strategy_used, report.degraded, report.total
        )?;
    } else {
        writeln!(out, "Strategy:   {}", report.strategy_used)?;
    }
    writeln!(out, "Threshold:  {}", report.threshold)?;
    writeln!(out, "Correct:    {} / {}", report.correct, report.total)?;
    writeln!(out, "Accuracy:   {:.2} %", report.accuracy_percent)?;
    writeln!(out, "Avg semantic similarity: {:.3}", report.avg_semantic_similarity)?;
    writeln!(out, "Avg overall score:       {:.3}", report.avg_overall_score)?;
    writeln!(out, "Elapsed:    {}", format_elapsed(elapsed))?;

    if details {
        writeln!(out)?;
        for (i, d) in report.details.iter().enumerate() {
            writeln!(
                out,
                "[{i}] {} overall={:.3} similarity={:.3} completeness={:.3}{}  {} | {}",
                if d.report.is_correct { "PASS" } else { "FAIL" },
                d.report.overall_score,
                d.report.semantic_similarity,
                d.report.completeness,
                if d.degraded { " (fallback)" } else { "" },
                one_line(&d.pair.prediction),
                one_line(&d.pair.reference),
            )?;
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    report: &'a AggregateReport,
    summary: BTreeMap<&'static str, f64>,
    elapsed: String,
}

#[derive(Serialize)]
struct JsonAssessment<'a> {
    #[serde(flatten)]
    pair: &'a AnswerPair,
    #[serde(flatten)]
    report: &'a QualityReport,
    threshold: f64,
    strategy_used: &'a Strategy,
}

fn write_report_json(out: &mut impl Write, report: &AggregateReport, elapsed: Duration) -> Result<()> {
    let json = JsonReport {
        report,
        summary: report.summary(),
        elapsed: format_elapsed(elapsed),
    };
    writeln!(out, "{}", serde_json::to_string_pretty(&json)?)?;
    Ok(())
}

fn format_elapsed(elapsed: Duration) -> String {
    let millis = Duration::from_millis(elapsed.as_millis() as u64);
    humantime::format_duration(millis).to_string()
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Evaluator;
    use crate::config::EvaluatorConfig;

    fn sample_report() -> AggregateReport {
        Evaluator::lexical(EvaluatorConfig::default())
            .unwrap()
            .score(&["北京", "猫"], &["北京", "狗"])
            .unwrap()
    }

    #[test]
    fn text_report_lists_headline_numbers() {
        let mut buf = Vec::new();
        write_report_text(&mut buf, &sample_report(), Duration::from_millis(1500), true).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("Strategy:   fallback"));
        assert!(text.contains("Correct:    1 / 2"));
        assert!(text.contains("Accuracy:   50.00 %"));
        assert!(text.contains("Elapsed:    1s 500ms"));
        assert!(text.contains("[0] PASS"));
        assert!(text.contains("[1] FAIL"));
    }

    #[test]
    fn json_report_includes_summary_and_details() {
        let mut buf = Vec::new();
        write_report_json(&mut buf, &sample_report(), Duration::from_millis(3)).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&buf).unwrap();

        assert_eq!(json["total"], 2);
        assert_eq!(json["correct"], 1);
        assert_eq!(json["accuracy_percent"], 50.0);
        assert_eq!(json["summary"]["accuracy"], 50.0);
        assert_eq!(json["details"].as_array().unwrap().len(), 2);
        assert_eq!(json["elapsed"], "3ms");
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!(check_format("text").is_ok());
        assert!(check_format("json").is_ok());
        assert!(check_format("yaml").is_err());
    }
}
