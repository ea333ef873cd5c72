//! # Code Runner
//!
//! Executes one candidate completion against one task's hidden tests inside an
//! ephemeral, isolated workspace and classifies what happened.
//!
//! An attempt moves through `Compiling` and then `Running`; each stage has its
//! own wall-clock budget. Every candidate-side failure is a terminal
//! [`Outcome`]. Only faults of the evaluator itself (missing toolchain, broken
//! docker daemon, unwritable temp dir) surface as [`SandboxError`].

pub mod attempt;
pub mod error;
pub mod process;
pub mod toolchain;
pub mod workspace;

use std::sync::Arc;

use async_trait::async_trait;
use util::config::SandboxBackend;
use util::execution_config::ExecutionConfig;

pub use crate::attempt::{
    AttemptRequest, AttemptResponse, Budgets, Diagnostics, Outcome, Stage, Status,
};
pub use crate::error::SandboxError;
use crate::process::{StageResult, exit_code, run_with_budget};
use crate::toolchain::{DockerToolchain, LocalToolchain, Toolchain};
use crate::workspace::AttemptWorkspace;

/// Anything that can turn an attempt into an outcome.
///
/// The sandbox is the production implementation; the seam exists so the
/// attempt manager can be driven by other backends.
#[async_trait]
pub trait AttemptExecutor: Send + Sync {
    async fn execute(
        &self,
        request: &AttemptRequest,
        budgets: &Budgets,
    ) -> Result<Outcome, SandboxError>;
}

pub struct Sandbox {
    toolchain: Arc<dyn Toolchain>,
    max_output_bytes: usize,
}

impl Sandbox {
    pub fn new(toolchain: Arc<dyn Toolchain>, max_output_bytes: usize) -> Self {
        Self {
            toolchain,
            max_output_bytes,
        }
    }

    pub fn from_config(backend: SandboxBackend, config: &ExecutionConfig) -> Self {
        let toolchain: Arc<dyn Toolchain> = match backend {
            SandboxBackend::Docker => Arc::new(DockerToolchain::new(
                config.toolchain.clone(),
                config.limits.clone(),
            )),
            SandboxBackend::Local => Arc::new(LocalToolchain::new(config.toolchain.clone())),
        };
        if !toolchain.isolates_network() {
            tracing::warn!(
                "Local sandbox runs candidates with network access; set toolchain.unshare_network to isolate them"
            );
        }
        Self::new(toolchain, config.limits.max_output_bytes)
    }

    pub fn toolchain_name(&self) -> &'static str {
        self.toolchain.name()
    }

    pub fn isolates_network(&self) -> bool {
        self.toolchain.isolates_network()
    }

    /// Runs a single attempt to a terminal outcome.
    ///
    /// No retries happen here. Re-submitting the same request is safe because
    /// every call gets a brand-new workspace.
    pub async fn execute(
        &self,
        request: &AttemptRequest,
        budgets: &Budgets,
    ) -> Result<Outcome, SandboxError> {
        let task_id = request.task_id.as_str();

        if request.is_malformed() {
            tracing::warn!(task_id, "Rejecting attempt without prompt or solution");
            return Ok(Outcome::InternalError {
                reason: "missing prompt/solution".to_string(),
            });
        }

        let result = self.compile_and_run(request, budgets).await;
        match &result {
            Ok(outcome) => tracing::info!(task_id, status = ?outcome.status(), "Attempt finished"),
            Err(e) => tracing::error!(task_id, error = %e, "Sandbox could not evaluate attempt"),
        }
        result
    }

    async fn compile_and_run(
        &self,
        request: &AttemptRequest,
        budgets: &Budgets,
    ) -> Result<Outcome, SandboxError> {
        let workspace = AttemptWorkspace::create().map_err(SandboxError::Workspace)?;
        workspace
            .write_source(self.toolchain.source_file(), &request.source_unit())
            .map_err(SandboxError::Workspace)?;

        tracing::debug!(
            task_id = %request.task_id,
            workspace = %workspace.path().display(),
            toolchain = self.toolchain.name(),
            "Compiling"
        );

        let compiled = run_with_budget(
            self.toolchain.compile_command(&workspace),
            budgets.compile,
            self.max_output_bytes,
        )
        .await?;

        match compiled {
            StageResult::TimedOut => {
                self.toolchain.after_timeout(&workspace, Stage::Compile).await;
                return Ok(Outcome::Timeout {
                    stage: Stage::Compile,
                    diagnostics: Diagnostics::message("compile timeout"),
                });
            }
            StageResult::Exited {
                status,
                stdout,
                stderr,
            } if !status.success() => {
                if let Some(message) = self.toolchain.infrastructure_failure(&status, &stderr) {
                    return Err(SandboxError::Backend {
                        stage: Stage::Compile,
                        message,
                    });
                }
                return Ok(Outcome::CompileError(Diagnostics {
                    stdout,
                    stderr,
                    exit_code: None,
                }));
            }
            StageResult::Exited { .. } => {}
        }

        tracing::debug!(task_id = %request.task_id, "Running");

        let ran = run_with_budget(
            self.toolchain.run_command(&workspace),
            budgets.run,
            self.max_output_bytes,
        )
        .await?;

        let outcome = match ran {
            StageResult::TimedOut => {
                self.toolchain.after_timeout(&workspace, Stage::Run).await;
                Outcome::Timeout {
                    stage: Stage::Run,
                    diagnostics: Diagnostics::message("execution timeout"),
                }
            }
            StageResult::Exited {
                status,
                stdout,
                stderr,
            } => {
                if !status.success() {
                    if let Some(message) = self.toolchain.infrastructure_failure(&status, &stderr)
                    {
                        return Err(SandboxError::Backend {
                            stage: Stage::Run,
                            message,
                        });
                    }
                }

                let diagnostics = Diagnostics {
                    stdout,
                    stderr,
                    exit_code: Some(exit_code(&status)),
                };
                if status.success() {
                    Outcome::Pass(diagnostics)
                } else {
                    Outcome::RuntimeError(diagnostics)
                }
            }
        };

        Ok(outcome)
    }
}

#[async_trait]
impl AttemptExecutor for Sandbox {
    async fn execute(
        &self,
        request: &AttemptRequest,
        budgets: &Budgets,
    ) -> Result<Outcome, SandboxError> {
        Sandbox::execute(self, request, budgets).await
    }
}
