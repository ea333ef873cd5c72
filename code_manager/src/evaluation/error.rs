use std::io;
use std::path::PathBuf;

use scorer::ScorerError;
use util::execution_config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("Required setting {0} is not set")]
    MissingSetting(&'static str),

    #[error("Invalid k list '{0}': expected comma-separated positive integers")]
    InvalidK(String),

    #[error("Provide EVAL_COMPLETIONS or EVAL_COMPLETIONS_DIR")]
    MissingCompletions,

    #[error("No problems in dataset {0:?}")]
    EmptyDataset(PathBuf),

    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid JSON in {path:?} line {line}: {source}")]
    InvalidJson {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to encode results: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Attempt worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Scorer(#[from] ScorerError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
