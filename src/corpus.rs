//! Reading evaluation corpora and prediction files (JSON lines).
//!
//! Any unreadable file, malformed line or missing field aborts the whole
//! load: a silently shortened corpus would skew every statistic.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{EvalError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusRecord {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    question: Option<String>,
    answer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPrediction {
    prediction: Option<String>,
}

/// Files making up the corpus at `path`: the file itself, or every
/// `*.jsonl` directly inside a directory, sorted by name.
pub fn corpus_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(EvalError::Configuration(format!(
            "corpus path does not exist: {}",
            path.display()
        )));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            EvalError::Configuration(format!("cannot list {}: {e}", path.display()))
        })?;
        let is_jsonl = entry.path().extension().is_some_and(|ext| ext == "jsonl");
        if entry.file_type().is_file() && is_jsonl {
            files.push(entry.into_path());
        }
    }

    if files.is_empty() {
        return Err(EvalError::Configuration(format!(
            "no .jsonl files found in {}",
            path.display()
        )));
    }
    Ok(files)
}

/// Load every record under `path`, in file order then line order.
pub fn load_corpus(path: &Path) -> Result<Vec<CorpusRecord>> {
    let mut records = Vec::new();

    for file in corpus_files(path)? {
        let before = records.len();
        for_each_json_line::<RawRecord>(&file, |line, raw| {
            let question = require(raw.question, "question", &file, line)?;
            let answer = require(raw.answer, "answer", &file, line)?;
            records.push(CorpusRecord {
                question: question.trim().to_string(),
                answer: answer.trim().to_string(),
            });
            Ok(())
        })?;
        debug!(file = %file.display(), records = records.len() - before, "loaded corpus file");
    }

    if records.is_empty() {
        return Err(EvalError::Configuration(format!(
            "corpus {} contains no records",
            path.display()
        )));
    }
    Ok(records)
}

/// Load predictions, one `{"prediction": "..."}` object per line.
pub fn load_predictions(path: &Path) -> Result<Vec<String>> {
    let mut predictions = Vec::new();
    for_each_json_line::<RawPrediction>(path, |line, raw| {
        predictions.push(require(raw.prediction, "prediction", path, line)?);
        Ok(())
    })?;
    Ok(predictions)
}

fn require(value: Option<String>, field: &str, path: &Path, line: usize) -> Result<String> {
    value.ok_or_else(|| {
        EvalError::Configuration(format!(
            "{}:{line}: record is missing required field `{field}`",
            path.display()
        ))
    })
}

fn for_each_json_line<T>(path: &Path, mut f: impl FnMut(usize, T) -> Result<()>) -> Result<()>
where
    T: DeserializeOwned,
{
    let file = File::open(path)
        .map_err(|e| EvalError::Configuration(format!("cannot read {}: {e}", path.display())))?;
    let reader = BufReader::new(file);

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|e| {
            EvalError::Configuration(format!("cannot read {}:{line_no}: {e}", path.display()))
        })?;
        if line.trim().is_empty() {
            continue;
        }

        let value: serde_json::Value =
            serde_json::from_str(&line).map_err(|source| EvalError::MalformedCorpusLine {
                path: path.to_path_buf(),
                line: line_no,
                source,
            })?;
        let item: T = serde_json::from_value(value).map_err(|e| {
            EvalError::Configuration(format!("{}:{line_no}: {e}", path.display()))
        })?;
        f(line_no, item)?;
    }

    Ok(())
}
