use std::env;
use std::path::PathBuf;

use util::config::parsed_var;

use crate::evaluation::error::EvaluationError;

const DEFAULT_KS: &[usize] = &[1, 10, 100];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionsSource {
    /// One JSONL file with candidates for every task.
    File(PathBuf),
    /// A directory of per-task files.
    Dir(PathBuf),
}

/// Inputs of one evaluation run, read from `EVAL_*` variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationSettings {
    pub dataset: PathBuf,
    pub completions: CompletionsSource,
    pub result_dir: PathBuf,
    pub ks: Vec<usize>,
    pub dry_run: bool,
}

impl EvaluationSettings {
    pub fn from_env() -> Result<Self, EvaluationError> {
        let dataset = non_empty_var("EVAL_DATASET")
            .map(PathBuf::from)
            .ok_or(EvaluationError::MissingSetting("EVAL_DATASET"))?;

        let completions = match (
            non_empty_var("EVAL_COMPLETIONS"),
            non_empty_var("EVAL_COMPLETIONS_DIR"),
        ) {
            (Some(file), _) => CompletionsSource::File(PathBuf::from(file)),
            (None, Some(dir)) => CompletionsSource::Dir(PathBuf::from(dir)),
            (None, None) => return Err(EvaluationError::MissingCompletions),
        };

        let ks = match non_empty_var("EVAL_K") {
            Some(raw) => parse_ks(&raw)?,
            None => DEFAULT_KS.to_vec(),
        };

        Ok(Self {
            dataset,
            completions,
            result_dir: non_empty_var("EVAL_RESULT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("results")),
            ks,
            dry_run: parsed_var("EVAL_DRY_RUN").unwrap_or(false),
        })
    }

    /// Candidates kept per task.
    pub fn max_k(&self) -> usize {
        self.ks.iter().copied().max().unwrap_or(100)
    }
}

/// Parses `"1,10,100"`. Empty items are ignored; zero and non-numbers are rejected.
pub fn parse_ks(raw: &str) -> Result<Vec<usize>, EvaluationError> {
    let ks = raw
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| item.parse::<usize>().ok().filter(|&k| k > 0))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| EvaluationError::InvalidK(raw.to_string()))?;

    if ks.is_empty() {
        return Err(EvaluationError::InvalidK(raw.to_string()));
    }
    Ok(ks)
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_k_lists() {
        assert_eq!(parse_ks("1,10,100").unwrap(), vec![1, 10, 100]);
        assert_eq!(parse_ks(" 5 , ,2").unwrap(), vec![5, 2]);
        assert!(matches!(parse_ks("1,0"), Err(EvaluationError::InvalidK(_))));
        assert!(matches!(parse_ks("one"), Err(EvaluationError::InvalidK(_))));
        assert!(matches!(parse_ks(" , "), Err(EvaluationError::InvalidK(_))));
    }

    #[test]
    fn max_k_is_largest_requested() {
        let settings = EvaluationSettings {
            dataset: PathBuf::from("d.jsonl"),
            completions: CompletionsSource::File(PathBuf::from("c.jsonl")),
            result_dir: PathBuf::from("out"),
            ks: vec![1, 25, 10],
            dry_run: false,
        };
        assert_eq!(settings.max_k(), 25);
    }
}
