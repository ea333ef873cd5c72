//! Runs every candidate of every dataset task through the attempt manager
//! and scores the results.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use code_runner::{AttemptRequest, AttemptResponse, Budgets, Status};
use scorer::{Metrics, ResultCollector, aggregate};
use serde::Serialize;

use crate::evaluation::dataset::{Completions, Dataset};
use crate::evaluation::error::EvaluationError;
use crate::manager::manager::AttemptManager;

pub const METRICS_FILE: &str = "evaluate_passk.json";
pub const ATTEMPTS_FILE: &str = "attempts.jsonl";

/// One line of `attempts.jsonl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    #[serde(flatten)]
    pub response: AttemptResponse,
    pub candidate: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub infrastructure_error: Option<String>,
}

impl AttemptRecord {
    fn infrastructure_fault(task_id: &str, candidate: usize, error: String) -> Self {
        Self {
            response: AttemptResponse {
                status: Status::InternalError,
                task_id: task_id.to_string(),
                stdout: String::new(),
                stderr: error.clone(),
                pass: false,
                exit_code: None,
            },
            candidate,
            infrastructure_error: Some(error),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Evaluation {
    pub metrics: Metrics,
    /// Ordered by task id, then candidate index.
    pub records: Vec<AttemptRecord>,
}

impl Evaluation {
    pub fn attempts(&self) -> usize {
        self.records.len()
    }

    pub fn passed(&self) -> usize {
        self.records.iter().filter(|r| r.response.pass).count()
    }

    pub fn infrastructure_errors(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.infrastructure_error.is_some())
            .count()
    }

    /// Writes `evaluate_passk.json` and `attempts.jsonl` into `dir`, creating it if needed.
    pub fn write(&self, dir: &Path) -> Result<(), EvaluationError> {
        fs::create_dir_all(dir).map_err(|source| EvaluationError::Write {
            path: dir.to_path_buf(),
            source,
        })?;

        let metrics_path = dir.join(METRICS_FILE);
        let metrics = serde_json::to_string_pretty(&self.metrics)?;
        fs::write(&metrics_path, metrics + "\n").map_err(|source| EvaluationError::Write {
            path: metrics_path.clone(),
            source,
        })?;

        let attempts_path = dir.join(ATTEMPTS_FILE);
        let write_err = |source: std::io::Error| EvaluationError::Write {
            path: attempts_path.clone(),
            source,
        };
        let mut out = BufWriter::new(File::create(&attempts_path).map_err(write_err)?);
        for record in &self.records {
            serde_json::to_writer(&mut out, record)?;
            out.write_all(b"\n").map_err(write_err)?;
        }
        out.flush().map_err(write_err)?;

        tracing::info!("Wrote {:?} and {:?}", metrics_path, attempts_path);
        Ok(())
    }
}

/// Executes all candidates in parallel (bounded by the manager) and
/// aggregates pass@1 and pass@k for `ks`.
///
/// Every candidate runs; a passing one does not stop the rest of its task.
/// Infrastructure faults count as failed attempts.
pub async fn evaluate(
    manager: &AttemptManager,
    dataset: &Dataset,
    completions: &Completions,
    ks: &[usize],
    budgets: Budgets,
) -> Result<Evaluation, EvaluationError> {
    let collector = Arc::new(ResultCollector::with_tasks(dataset.task_ids()));

    let unknown = completions
        .task_ids()
        .filter(|id| dataset.get(id).is_none())
        .count();
    if unknown > 0 {
        tracing::warn!("Ignoring completions for {} tasks not in the dataset", unknown);
    }

    let mut handles = Vec::new();
    for task in dataset.iter() {
        for (candidate, solution) in completions.for_task(&task.task_id).iter().enumerate() {
            let request = AttemptRequest::new(
                task.task_id.clone(),
                task.prompt.clone(),
                solution.clone(),
                task.tests.clone(),
            );
            let manager = manager.clone();
            let collector = Arc::clone(&collector);

            handles.push(tokio::spawn(async move {
                let record = match manager.run(&request, &budgets).await {
                    Ok(outcome) => AttemptRecord {
                        response: outcome.into_response(&request.task_id),
                        candidate,
                        infrastructure_error: None,
                    },
                    Err(e) => {
                        tracing::error!(
                            task_id = %request.task_id,
                            candidate,
                            "Infrastructure fault, counting attempt as failed: {}",
                            e
                        );
                        AttemptRecord::infrastructure_fault(&request.task_id, candidate, e.to_string())
                    }
                };
                collector
                    .record(&request.task_id, candidate, record.response.pass)
                    .map(|()| record)
            }));
        }
    }

    tracing::info!(
        "Evaluating {} attempts across {} tasks",
        handles.len(),
        dataset.len()
    );

    let mut records = Vec::with_capacity(handles.len());
    for joined in futures::future::join_all(handles).await {
        records.push(joined??);
    }

    let sets = collector.snapshot();
    let metrics = aggregate(&sets, ks)?;
    Ok(Evaluation { metrics, records })
}

/// Counts what a real run would do, without executing anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DryRunSummary {
    pub problems: usize,
    pub tasks_with_completions: usize,
    pub attempts: usize,
}

pub fn dry_run(dataset: &Dataset, completions: &Completions) -> DryRunSummary {
    DryRunSummary {
        problems: dataset.len(),
        tasks_with_completions: completions.tasks_with_candidates(),
        attempts: dataset
            .iter()
            .map(|task| completions.for_task(&task.task_id).len())
            .sum(),
    }
}
