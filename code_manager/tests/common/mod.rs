#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use code_runner::{
    AttemptExecutor, AttemptRequest, Budgets, Diagnostics, Outcome, SandboxError, Stage,
};

/// Executor that sleeps instead of compiling.
///
/// A solution containing `PASS` passes, `FAULT` raises an infrastructure
/// error, anything else is a runtime error.
pub struct MockExecutor {
    pub delay: Duration,
    pub running: AtomicUsize,
    pub max_observed: AtomicUsize,
    pub executed: AtomicUsize,
}

impl MockExecutor {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            running: AtomicUsize::new(0),
            max_observed: AtomicUsize::new(0),
            executed: AtomicUsize::new(0),
        }
    }

    pub fn max_observed(&self) -> usize {
        self.max_observed.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> usize {
        self.executed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AttemptExecutor for MockExecutor {
    async fn execute(
        &self,
        request: &AttemptRequest,
        budgets: &Budgets,
    ) -> Result<Outcome, SandboxError> {
        let current = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_observed.fetch_max(current, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.running.fetch_sub(1, Ordering::SeqCst);
        self.executed.fetch_add(1, Ordering::SeqCst);

        if request.solution.contains("FAULT") {
            return Err(SandboxError::Backend {
                stage: Stage::Run,
                message: "docker daemon unreachable".to_string(),
            });
        }
        if request.solution.contains("SLOW") && budgets.run < Duration::from_secs(1) {
            return Ok(Outcome::Timeout {
                stage: Stage::Run,
                diagnostics: Diagnostics::message("execution timeout"),
            });
        }

        let diagnostics = Diagnostics {
            stdout: format!("ran {}", request.task_id),
            stderr: String::new(),
            exit_code: Some(if request.solution.contains("PASS") { 0 } else { 1 }),
        };
        if request.solution.contains("PASS") {
            Ok(Outcome::Pass(diagnostics))
        } else {
            Ok(Outcome::RuntimeError(diagnostics))
        }
    }
}

pub fn request(task_id: &str, solution: &str) -> AttemptRequest {
    AttemptRequest::new(task_id, "// prompt", solution, "// tests")
}
