//! Bounded subprocess execution: one wall-clock ceiling, capped capture.
//!
//! Every stage runs as the leader of its own process group. The whole group
//! is killed when the stage ends, so nothing the stage forked outlives it.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::{Duration, timeout};

use crate::error::SandboxError;

/// How long to wait for the pipes to close once the child itself has exited.
/// A descendant that left the process group can otherwise keep them open forever.
const PIPE_GRACE: Duration = Duration::from_secs(1);

const CHUNK_SIZE: usize = 8192;

#[derive(Debug)]
pub enum StageResult {
    Exited {
        status: ExitStatus,
        stdout: String,
        stderr: String,
    },
    TimedOut,
}

/// Spawns `command`, waits at most `budget`, and captures up to
/// `max_output_bytes` of each output stream. The child's process group is
/// killed when the budget runs out, and again after a normal exit to reap
/// background descendants.
pub async fn run_with_budget(
    mut command: Command,
    budget: Duration,
    max_output_bytes: usize,
) -> Result<StageResult, SandboxError> {
    let program = command.as_std().get_program().to_string_lossy().into_owned();

    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let mut child = command.spawn().map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            SandboxError::ToolchainUnavailable {
                program: program.clone(),
            }
        } else {
            SandboxError::Spawn {
                program: program.clone(),
                source,
            }
        }
    })?;
    let group = ProcessGroup::of(&child);

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| SandboxError::Capture(io::Error::other("stdout pipe missing")))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| SandboxError::Capture(io::Error::other("stderr pipe missing")))?;

    let stdout_capture = Capture::shared(max_output_bytes);
    let stderr_capture = Capture::shared(max_output_bytes);
    let stdout_task = tokio::spawn(read_bounded(stdout, Arc::clone(&stdout_capture)));
    let stderr_task = tokio::spawn(read_bounded(stderr, Arc::clone(&stderr_capture)));

    match timeout(budget, child.wait()).await {
        Ok(waited) => {
            group.kill();
            let status = waited.map_err(SandboxError::Capture)?;
            let stdout = collect(stdout_task, &stdout_capture).await?;
            let stderr = collect(stderr_task, &stderr_capture).await?;
            Ok(StageResult::Exited {
                status,
                stdout,
                stderr,
            })
        }
        Err(_) => {
            tracing::debug!("'{}' exceeded its {:?} budget, killing", program, budget);
            group.kill();
            if let Err(e) = child.start_kill() {
                tracing::warn!("Failed to kill '{}': {}", program, e);
            }
            let _ = child.wait().await;
            stdout_task.abort();
            stderr_task.abort();
            Ok(StageResult::TimedOut)
        }
    }
}

/// Numeric exit code, mapping signal deaths to the shell's `128 + signo`.
pub fn exit_code(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

/// Process group led by a stage's child.
struct ProcessGroup(Option<u32>);

impl ProcessGroup {
    fn of(child: &Child) -> Self {
        Self(child.id())
    }

    #[cfg(unix)]
    fn kill(&self) {
        use nix::errno::Errno;
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        let Some(pgid) = self.0 else { return };
        match killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
            // ESRCH: every member is already gone.
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => tracing::warn!("Failed to kill process group {}: {}", pgid, e),
        }
    }

    #[cfg(not(unix))]
    fn kill(&self) {}
}

/// Bytes kept from one output stream, shared with its reader task so a
/// partial capture survives the task being aborted.
struct Capture {
    kept: Vec<u8>,
    dropped: u64,
    limit: usize,
}

type SharedCapture = Arc<Mutex<Capture>>;

impl Capture {
    fn shared(limit: usize) -> SharedCapture {
        Arc::new(Mutex::new(Self {
            kept: Vec::with_capacity(limit.min(CHUNK_SIZE)),
            dropped: 0,
            limit,
        }))
    }

    fn push(&mut self, chunk: &[u8]) {
        let take = chunk.len().min(self.limit.saturating_sub(self.kept.len()));
        self.kept.extend_from_slice(&chunk[..take]);
        self.dropped += (chunk.len() - take) as u64;
    }

    fn render(&self) -> String {
        let mut text = String::from_utf8_lossy(&self.kept).into_owned();
        if self.dropped > 0 {
            text.push_str(&format!("\n[output truncated: {} bytes omitted]", self.dropped));
        }
        text
    }
}

fn render(capture: &SharedCapture) -> String {
    capture
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .render()
}

async fn collect(
    task: JoinHandle<io::Result<()>>,
    capture: &SharedCapture,
) -> Result<String, SandboxError> {
    let abort = task.abort_handle();
    match timeout(PIPE_GRACE, task).await {
        Ok(joined) => {
            joined
                .map_err(|e| SandboxError::Capture(io::Error::other(e)))?
                .map_err(SandboxError::Capture)?;
            Ok(render(capture))
        }
        Err(_) => {
            abort.abort();
            let mut text = render(capture);
            text.push_str("\n[output incomplete: pipe held open by a detached process]");
            Ok(text)
        }
    }
}

/// Reads the whole stream into `capture`, which keeps at most its limit. The
/// rest is drained so the writer never blocks on a full pipe.
async fn read_bounded<R>(mut reader: R, capture: SharedCapture) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        capture
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(&chunk[..n]);
    }
}
