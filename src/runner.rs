use std::time::Instant;

use tracing::{info, warn};

use crate::aggregate::Evaluator;
use crate::cli::{Cli, Command};
use crate::corpus::{load_corpus, load_predictions};
use crate::error::{EvalError, Result};
use crate::normalize::extract_answer;
use crate::output;
use crate::quality::AnswerPair;

/// Exit status when a run finishes below `--min-accuracy`.
pub const EXIT_BELOW_MINIMUM: i32 = 2;

/// Execute the parsed command and return the process exit status.
pub fn run(cli: &Cli) -> Result<i32> {
    cli.validate().map_err(EvalError::InvalidArg)?;

    match &cli.command {
        Command::Score {
            corpus,
            predictions,
            extract,
            min_accuracy,
            details,
        } => {
            let config = cli.evaluator_config()?;
            let records = load_corpus(corpus)?;
            let mut predictions = load_predictions(predictions)?;
            info!(
                records = records.len(),
                predictions = predictions.len(),
                "loaded evaluation inputs"
            );

            if *extract {
                predictions = predictions.iter().map(|p| extract_answer(p)).collect();
            }
            let references: Vec<String> = records.into_iter().map(|r| r.answer).collect();

            let evaluator = Evaluator::new(config)?;
            let start = Instant::now();
            let report = evaluator.score(&predictions, &references)?;
            output::print_report(&cli.output, &report, start.elapsed(), *details)?;

            match min_accuracy {
                Some(min) if report.accuracy_percent < *min => {
                    warn!(
                        accuracy = report.accuracy_percent,
                        required = *min,
                        "accuracy below required minimum"
                    );
                    Ok(EXIT_BELOW_MINIMUM)
                }
                _ => Ok(0),
            }
        }
        Command::Assess {
            prediction,
            reference,
        } => {
            let evaluator = Evaluator::new(cli.evaluator_config()?)?;
            let report = evaluator.assess(prediction, reference);
            output::print_assessment(
                &cli.output,
                &AnswerPair::new(prediction.as_str(), reference.as_str()),
                &report,
                evaluator.config().similarity_threshold,
                &evaluator.strategy(),
            )?;
            Ok(0)
        }
        Command::Extract { text } => {
            let answer = extract_answer(text);
            if cli.output == "json" {
                println!("{}", serde_json::json!({ "answer": answer }));
            } else {
                println!("{answer}");
            }
            Ok(0)
        }
    }
}
