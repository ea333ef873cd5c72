//! Reads one attempt request as JSON on stdin, executes it, and prints the
//! attempt response as a single JSON line on stdout.
//!
//! Exit codes: 0 for every classified outcome, 1 for unparseable input,
//! 2 when the sandbox itself could not run.

use std::io::Read;
use std::process::ExitCode;

use code_runner::{AttemptRequest, Budgets, Outcome, Sandbox};
use util::config::AppConfig;
use util::logging::init_logging;

#[tokio::main]
async fn main() -> ExitCode {
    let config = AppConfig::from_env();
    let _log_guard = init_logging(&config);

    let mut input = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut input) {
        return reject(format!("failed to read stdin: {}", e));
    }

    let request: AttemptRequest = match serde_json::from_str(&input) {
        Ok(request) => request,
        Err(e) => return reject(e.to_string()),
    };

    let execution_config = match config.execution_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("{}", e);
            return ExitCode::from(2);
        }
    };

    let sandbox = Sandbox::from_config(config.sandbox_backend, &execution_config);
    let budgets = Budgets::from(&execution_config.budgets);

    match sandbox.execute(&request, &budgets).await {
        Ok(outcome) => {
            emit(outcome, &request.task_id);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::from(2)
        }
    }
}

fn reject(reason: String) -> ExitCode {
    tracing::warn!("Rejecting malformed attempt: {}", reason);
    emit(Outcome::InternalError { reason }, "unknown");
    ExitCode::from(1)
}

fn emit(outcome: Outcome, task_id: &str) {
    match serde_json::to_string(&outcome.into_response(task_id)) {
        Ok(line) => println!("{}", line),
        Err(e) => eprintln!("failed to encode response: {}", e),
    }
}
