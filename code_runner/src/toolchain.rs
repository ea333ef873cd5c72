//! Compile/run command builders for each isolation backend.

use std::ffi::OsStr;
use std::process::ExitStatus;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use util::execution_config::{ExecutionLimits, ToolchainOptions};

use crate::attempt::Stage;
use crate::process::exit_code;
use crate::workspace::AttemptWorkspace;

/// Builds the two stage commands for an attempt workspace.
#[async_trait]
pub trait Toolchain: Send + Sync {
    fn name(&self) -> &'static str;

    /// File name the source unit is written to inside the workspace.
    fn source_file(&self) -> &str;

    fn compile_command(&self, workspace: &AttemptWorkspace) -> Command;

    fn run_command(&self, workspace: &AttemptWorkspace) -> Command;

    /// Distinguishes a backend failure from a genuine non-zero exit of the
    /// compiler or candidate program. Returns a description of the fault.
    fn infrastructure_failure(&self, _status: &ExitStatus, _stderr: &str) -> Option<String> {
        None
    }

    /// Whether the candidate program runs without network access.
    fn isolates_network(&self) -> bool;

    /// Called after a stage was killed for exceeding its budget.
    async fn after_timeout(&self, _workspace: &AttemptWorkspace, _stage: Stage) {}
}

/// Runs the compiler and the resulting binary directly on the host.
pub struct LocalToolchain {
    options: ToolchainOptions,
}

impl LocalToolchain {
    pub fn new(options: ToolchainOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Toolchain for LocalToolchain {
    fn name(&self) -> &'static str {
        "local"
    }

    fn source_file(&self) -> &str {
        &self.options.source_file
    }

    fn isolates_network(&self) -> bool {
        self.options.unshare_network
    }

    fn compile_command(&self, workspace: &AttemptWorkspace) -> Command {
        let mut cmd = Command::new(&self.options.compiler);
        cmd.args(&self.options.flags)
            .arg("-o")
            .arg(&self.options.binary)
            .arg(&self.options.source_file)
            .current_dir(workspace.path());
        cmd
    }

    fn run_command(&self, workspace: &AttemptWorkspace) -> Command {
        let binary = workspace.path().join(&self.options.binary);

        let mut cmd = if self.options.unshare_network {
            let mut cmd = Command::new("unshare");
            cmd.args(["--net", "--map-root-user", "--"]).arg(&binary);
            cmd
        } else {
            Command::new(&binary)
        };

        cmd.current_dir(workspace.path())
            .env_clear()
            .env("PATH", "/usr/local/bin:/usr/bin:/bin");
        cmd
    }
}

/// Runs every stage in a fresh `docker run --rm --network=none` container with
/// the workspace bind-mounted at `/code`.
pub struct DockerToolchain {
    options: ToolchainOptions,
    limits: ExecutionLimits,
}

/// `docker run` reserves 125 for daemon errors, 126/127 for a container
/// command that could not be started.
const DOCKER_FAILURE_CODES: [i32; 3] = [125, 126, 127];

/// Upper bound on `docker rm -f` after a timeout.
const CONTAINER_REMOVAL_GRACE: Duration = Duration::from_secs(10);

impl DockerToolchain {
    pub fn new(options: ToolchainOptions, limits: ExecutionLimits) -> Self {
        Self { options, limits }
    }

    fn container(&self, workspace: &AttemptWorkspace, stage: Stage) -> Command {
        let mount_mode = match stage {
            Stage::Compile => "rw",
            Stage::Run => "ro",
        };

        let mut cmd = Command::new("docker");
        cmd.arg("run")
            .arg("--rm")
            .arg(format!("--name={}", workspace.container_name(stage)))
            .arg("--network=none")
            .arg(format!("--memory={}b", self.limits.max_memory))
            .arg(format!("--cpus={}", self.limits.max_cpus))
            .arg(format!("--pids-limit={}", self.limits.max_processes))
            .arg("--security-opt=no-new-privileges")
            .arg("-v")
            .arg(format!("{}:/code:{}", workspace.path().display(), mount_mode))
            .arg("-w")
            .arg("/code")
            .arg(&self.options.docker_image);
        cmd
    }
}

#[async_trait]
impl Toolchain for DockerToolchain {
    fn name(&self) -> &'static str {
        "docker"
    }

    fn source_file(&self) -> &str {
        &self.options.source_file
    }

    fn isolates_network(&self) -> bool {
        true
    }

    fn compile_command(&self, workspace: &AttemptWorkspace) -> Command {
        let mut cmd = self.container(workspace, Stage::Compile);
        cmd.arg(&self.options.compiler)
            .args(&self.options.flags)
            .arg("-o")
            .arg(&self.options.binary)
            .arg(&self.options.source_file);
        cmd
    }

    fn run_command(&self, workspace: &AttemptWorkspace) -> Command {
        let mut cmd = self.container(workspace, Stage::Run);
        cmd.arg(format!("./{}", self.options.binary));
        cmd
    }

    fn infrastructure_failure(&self, status: &ExitStatus, stderr: &str) -> Option<String> {
        let code = exit_code(status);
        if DOCKER_FAILURE_CODES.contains(&code) && stderr.contains("docker") {
            Some(format!("docker exited with {}: {}", code, stderr.trim()))
        } else {
            None
        }
    }

    async fn after_timeout(&self, workspace: &AttemptWorkspace, stage: Stage) {
        let name = workspace.container_name(stage);
        force_remove_container("docker", &name, CONTAINER_REMOVAL_GRACE).await;
    }
}

/// Runs `<docker> rm -f <name>`, giving up after `grace` so a wedged daemon
/// cannot hold the attempt open.
async fn force_remove_container(docker: impl AsRef<OsStr>, name: &str, grace: Duration) {
    let removal = Command::new(docker)
        .arg("rm")
        .arg("-f")
        .arg(name)
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(grace, removal).await {
        Ok(Ok(out)) if out.status.success() => {
            tracing::debug!("Removed timed-out container {}", name);
        }
        Ok(Ok(out)) => tracing::warn!(
            "docker rm -f {} failed: {}",
            name,
            String::from_utf8_lossy(&out.stderr).trim()
        ),
        Ok(Err(e)) => tracing::warn!("Could not run docker rm -f {}: {}", name, e),
        Err(_) => tracing::warn!("docker rm -f {} did not finish within {:?}", name, grace),
    }
}
