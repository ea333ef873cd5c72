//! Attempt wire payloads and the classified outcome of running one.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use util::execution_config::StageBudgets;

/// One (task, candidate) pairing submitted for execution.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AttemptRequest {
    #[serde(default = "default_task_id")]
    pub task_id: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default, alias = "canonical_solution")]
    pub solution: String,
    #[serde(default)]
    pub tests: String,
}

fn default_task_id() -> String {
    "unknown".to_string()
}

impl AttemptRequest {
    pub fn new(
        task_id: impl Into<String>,
        prompt: impl Into<String>,
        solution: impl Into<String>,
        tests: impl Into<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            prompt: prompt.into(),
            solution: solution.into(),
            tests: tests.into(),
        }
    }

    /// An attempt with neither prompt nor solution has nothing to compile.
    pub fn is_malformed(&self) -> bool {
        self.prompt.is_empty() && self.solution.is_empty()
    }

    /// Prompt, solution and tests joined into the single translation unit handed to the compiler.
    pub fn source_unit(&self) -> String {
        format!("{}\n{}\n{}", self.prompt, self.solution, self.tests)
            .trim()
            .to_string()
    }
}

/// Wall-clock ceilings threaded into each `execute` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budgets {
    pub compile: Duration,
    pub run: Duration,
}

impl Budgets {
    pub fn from_secs(compile_secs: u64, run_secs: u64) -> Self {
        Self {
            compile: Duration::from_secs(compile_secs),
            run: Duration::from_secs(run_secs),
        }
    }
}

impl Default for Budgets {
    fn default() -> Self {
        Self::from(&StageBudgets::default())
    }
}

impl From<&StageBudgets> for Budgets {
    fn from(budgets: &StageBudgets) -> Self {
        Self::from_secs(budgets.compile_timeout_secs, budgets.run_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Compile,
    Run,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Compile => write!(f, "compile"),
            Stage::Run => write!(f, "run"),
        }
    }
}

/// Captured process output attached to an outcome.
///
/// `exit_code` is only set when the candidate program itself ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl Diagnostics {
    pub fn message(stderr: impl Into<String>) -> Self {
        Self {
            stderr: stderr.into(),
            ..Self::default()
        }
    }
}

/// Terminal, classified result of an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Pass(Diagnostics),
    CompileError(Diagnostics),
    RuntimeError(Diagnostics),
    Timeout {
        stage: Stage,
        diagnostics: Diagnostics,
    },
    /// The attempt itself was unusable; nothing was compiled.
    InternalError { reason: String },
}

impl Outcome {
    pub fn status(&self) -> Status {
        match self {
            Outcome::Pass(_) => Status::Pass,
            Outcome::CompileError(_) => Status::CompileError,
            Outcome::RuntimeError(_) => Status::RuntimeError,
            Outcome::Timeout { .. } => Status::Timeout,
            Outcome::InternalError { .. } => Status::InternalError,
        }
    }

    pub fn passed(&self) -> bool {
        matches!(self, Outcome::Pass(_))
    }

    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            Outcome::Pass(d) | Outcome::CompileError(d) | Outcome::RuntimeError(d) => Some(d),
            Outcome::Timeout { diagnostics, .. } => Some(diagnostics),
            Outcome::InternalError { .. } => None,
        }
    }

    pub fn into_response(self, task_id: impl Into<String>) -> AttemptResponse {
        let status = self.status();
        let diagnostics = match self {
            Outcome::Pass(d) | Outcome::CompileError(d) | Outcome::RuntimeError(d) => d,
            Outcome::Timeout { diagnostics, .. } => diagnostics,
            Outcome::InternalError { reason } => Diagnostics::message(reason),
        };

        AttemptResponse {
            status,
            task_id: task_id.into(),
            stdout: diagnostics.stdout,
            stderr: diagnostics.stderr,
            pass: status == Status::Pass,
            exit_code: diagnostics.exit_code,
        }
    }
}

/// Wire form of [`Outcome`]'s tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "OK")]
    Pass,
    CompileError,
    Timeout,
    RuntimeError,
    InternalError,
}

/// JSON object produced for every attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptResponse {
    pub status: Status,
    pub task_id: String,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    pub pass: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_defaults_and_alias() {
        let req: AttemptRequest =
            serde_json::from_value(json!({ "canonical_solution": "int f() { return 1; }" }))
                .unwrap();
        assert_eq!(req.task_id, "unknown");
        assert_eq!(req.prompt, "");
        assert_eq!(req.solution, "int f() { return 1; }");
        assert!(!req.is_malformed());
    }

    #[test]
    fn empty_prompt_and_solution_is_malformed() {
        let req = AttemptRequest::new("HumanEval/0", "", "", "int main() {}");
        assert!(req.is_malformed());
    }

    #[test]
    fn source_unit_joins_in_order_and_trims() {
        let req = AttemptRequest::new("t", "\n#include <x>", "int a;", "int main() {}\n\n");
        assert_eq!(req.source_unit(), "#include <x>\nint a;\nint main() {}");
    }

    #[test]
    fn pass_response_carries_exit_code() {
        let outcome = Outcome::Pass(Diagnostics {
            stdout: "ok\n".into(),
            stderr: String::new(),
            exit_code: Some(0),
        });
        let value = serde_json::to_value(outcome.into_response("HumanEval/3")).unwrap();
        assert_eq!(
            value,
            json!({
                "status": "OK",
                "task_id": "HumanEval/3",
                "stdout": "ok\n",
                "stderr": "",
                "pass": true,
                "exit_code": 0
            })
        );
    }

    #[test]
    fn compile_error_and_timeout_omit_exit_code() {
        let compile = Outcome::CompileError(Diagnostics::message("error: expected ';'"))
            .into_response("t");
        let value = serde_json::to_value(&compile).unwrap();
        assert_eq!(value["status"], "CompileError");
        assert_eq!(value["pass"], false);
        assert!(value.get("exit_code").is_none());

        let timeout = Outcome::Timeout {
            stage: Stage::Run,
            diagnostics: Diagnostics::message("execution timeout"),
        }
        .into_response("t");
        let value = serde_json::to_value(&timeout).unwrap();
        assert_eq!(value["status"], "Timeout");
        assert!(value.get("exit_code").is_none());
    }

    #[test]
    fn internal_error_reason_lands_in_stderr() {
        let response = Outcome::InternalError {
            reason: "missing prompt/solution".into(),
        }
        .into_response("t");
        assert_eq!(response.status, Status::InternalError);
        assert_eq!(response.stderr, "missing prompt/solution");
        assert!(!response.pass);
    }

    #[test]
    fn budgets_default_to_thirty_and_ten_seconds() {
        let budgets = Budgets::default();
        assert_eq!(budgets.compile, Duration::from_secs(30));
        assert_eq!(budgets.run, Duration::from_secs(10));
    }
}
