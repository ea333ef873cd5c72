//! Infrastructure faults raised by the sandbox.
//!
//! Anything wrong with the candidate program is reported as an
//! [`Outcome`](crate::attempt::Outcome) instead. A [`SandboxError`] means the
//! evaluator itself could not do its job.

use std::io;

use crate::attempt::Stage;

#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("Failed to prepare attempt workspace: {0}")]
    Workspace(#[source] io::Error),

    #[error("Toolchain program '{program}' is not available")]
    ToolchainUnavailable { program: String },

    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to capture process output: {0}")]
    Capture(#[source] io::Error),

    #[error("Sandbox backend failed during {stage} stage: {message}")]
    Backend { stage: Stage, message: String },
}
