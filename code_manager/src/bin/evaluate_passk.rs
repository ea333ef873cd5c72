//! Scores a completions set against a task dataset.
//!
//! Settings come from `EVAL_*` environment variables; sandbox and logging
//! settings from the usual `AppConfig` variables.

use std::process::ExitCode;
use std::sync::Arc;

use code_manager::evaluation::{
    Completions, CompletionsSource, Dataset, EvaluationError, EvaluationSettings, dry_run,
    evaluate,
};
use code_manager::manager::manager::AttemptManager;
use code_runner::{Budgets, Sandbox};
use util::config::AppConfig;
use util::logging::init_logging;

#[tokio::main]
async fn main() -> ExitCode {
    let config = AppConfig::from_env();
    let _log_guard = init_logging(&config);

    match run(&config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Evaluation failed: {}", e);
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &AppConfig) -> Result<(), EvaluationError> {
    let settings = EvaluationSettings::from_env()?;

    let dataset = Dataset::load(&settings.dataset)?;
    if dataset.is_empty() {
        return Err(EvaluationError::EmptyDataset(settings.dataset.clone()));
    }

    let completions = match &settings.completions {
        CompletionsSource::File(path) => Completions::load_file(path, settings.max_k())?,
        CompletionsSource::Dir(dir) => Completions::load_dir(dir, settings.max_k())?,
    };

    if settings.dry_run {
        let summary = dry_run(&dataset, &completions);
        eprintln!(
            "Dry run: {} problems, {} tasks with completions, {} attempts, k={:?}",
            summary.problems, summary.tasks_with_completions, summary.attempts, settings.ks
        );
        return Ok(());
    }

    let execution_config = config.execution_config()?;
    let sandbox = Sandbox::from_config(config.sandbox_backend, &execution_config);
    let manager = AttemptManager::new(Arc::new(sandbox), config.max_concurrent_attempts);
    let budgets = Budgets::from(&execution_config.budgets);

    let evaluation = evaluate(&manager, &dataset, &completions, &settings.ks, budgets).await?;
    evaluation.write(&settings.result_dir)?;

    let metrics = &evaluation.metrics;
    tracing::info!(
        attempts = evaluation.attempts(),
        passed = evaluation.passed(),
        infrastructure_errors = evaluation.infrastructure_errors(),
        "Evaluation finished"
    );
    eprintln!(
        "pass@1={:.4} resolved={}/{} attempts={} infrastructure_errors={}",
        metrics.pass_at_1,
        metrics.resolved,
        metrics.total,
        evaluation.attempts(),
        evaluation.infrastructure_errors()
    );
    eprintln!("Wrote {:?}", settings.result_dir.join("evaluate_passk.json"));
    Ok(())
}
