use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::EvaluatorConfig;
use crate::error::Result;
use crate::output;

#[derive(Parser, Debug)]
#[command(
    name = "semeval",
    version,
    about = "Score generated answers against reference answers by meaning"
)]
pub struct Cli {
    /// JSON file with evaluator settings; flags below override it.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, env = "SEMEVAL_THRESHOLD")]
    pub threshold: Option<f64>,

    // Only the negative toggle is exposed; embeddings are tried by default.
    #[arg(long = "no-embedding", global = true, default_value_t = true, action = clap::ArgAction::SetFalse)]
    pub embedding: bool,

    #[arg(long, global = true, env = "SEMEVAL_MODEL_ID")]
    pub model_id: Option<String>,

    /// Directory with config.json, tokenizer.json and model.safetensors.
    #[arg(long, global = true, env = "SEMEVAL_MODEL_DIR")]
    pub model_dir: Option<PathBuf>,

    #[arg(long, global = true, default_value = "text")]
    pub output: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Score a predictions file against a corpus of reference answers.
    Score {
        /// Corpus file, or directory of .jsonl files.
        #[arg(long)]
        corpus: PathBuf,

        /// JSON lines with a `prediction` field, in corpus order.
        #[arg(long)]
        predictions: PathBuf,

        /// Reduce raw model responses to their answer before scoring.
        #[arg(long)]
        extract: bool,

        /// Exit with status 2 when accuracy (percent) falls below this.
        #[arg(long)]
        min_accuracy: Option<f64>,

        /// Include per-pair lines in text output.
        #[arg(long)]
        details: bool,
    },

    /// Score a single prediction against a single reference.
    Assess {
        #[arg(long)]
        prediction: String,

        #[arg(long)]
        reference: String,
    },

    /// Print the answer extracted from a raw model response.
    Extract { text: String },
}

impl Cli {
    pub fn validate(&self) -> std::result::Result<(), String> {
        output::check_format(&self.output)?;

        if let Command::Score {
            min_accuracy: Some(min),
            ..
        } = &self.command
        {
            if !min.is_finite() || !(0.0..=100.0).contains(min) {
                return Err("min-accuracy must be within [0, 100]".to_string());
            }
        }

        Ok(())
    }

    /// Settings from `--config` (or defaults) with explicit flags applied.
    pub fn evaluator_config(&self) -> Result<EvaluatorConfig> {
        let mut config = match &self.config {
            Some(path) => EvaluatorConfig::load(path)?,
            None => EvaluatorConfig::default(),
        };

        if let Some(threshold) = self.threshold {
            config.similarity_threshold = threshold;
        }
        if !self.embedding {
            config.use_embedding = false;
        }
        if let Some(id) = &self.model_id {
            config.embedding_model_id = id.clone();
        }
        if let Some(dir) = &self.model_dir {
            config.embedding_model_dir = Some(dir.clone());
        }

        config.validate()?;
        Ok(config)
    }
}
