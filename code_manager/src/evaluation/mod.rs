//! Batch pass@k evaluation of a completions set against a task dataset.
//!
//! Loading lives in [`dataset`], environment settings in [`settings`], and
//! the parallel run plus result writing in [`runner`].

pub mod dataset;
pub mod error;
pub mod runner;
pub mod settings;

pub use dataset::{Completions, Dataset, Task};
pub use error::EvaluationError;
pub use runner::{AttemptRecord, DryRunSummary, Evaluation, dry_run, evaluate};
pub use settings::{CompletionsSource, EvaluationSettings};
