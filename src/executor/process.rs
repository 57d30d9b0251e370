// Bounded process runner
//
// Every tool that touches the operating system ends up here: one call, one
// child process, a hard timeout and a per-stream output cap.

use crate::executor::config::ExecutorConfig;
use crate::executor::types::{ExecutionConstraints, ExecutionRequest, ExecutionResult};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Read chunk size for child stdout/stderr
const READ_CHUNK_BYTES: usize = 8192;

/// Fallback when no limiter is injected
const DEFAULT_MAX_CONCURRENT: usize = 8;

/// Spawns shell commands with a timeout, output caps and a global spawn limit
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    shell: String,
    constraints: ExecutionConstraints,
    default_dir: PathBuf,
    limiter: Arc<Semaphore>,
}

impl ProcessRunner {
    pub fn new(shell: impl Into<String>, constraints: ExecutionConstraints) -> Self {
        let default_dir = constraints
            .working_dir
            .clone()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            shell: shell.into(),
            constraints,
            default_dir,
            limiter: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT)),
        }
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self::new(config.shell.clone(), config.constraints.clone()).with_limiter(Arc::new(
            Semaphore::new(config.max_concurrent_processes.max(1)),
        ))
    }

    /// Share a spawn limiter with other runners
    pub fn with_limiter(mut self, limiter: Arc<Semaphore>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn constraints(&self) -> &ExecutionConstraints {
        &self.constraints
    }

    /// Run a request under this runner's timeout policy.
    ///
    /// Never fails: timeouts and spawn failures are encoded in the result.
    pub async fn execute(&self, request: &ExecutionRequest) -> ExecutionResult {
        let timeout = self.constraints.effective_timeout(request.timeout_seconds);
        self.run_bounded(&request.command, request.working_directory.as_deref(), timeout)
            .await
    }

    /// Run a command with an already-clamped timeout.
    ///
    /// Callers with their own timeout policy (the coding agent) come through
    /// here instead of [`execute`](Self::execute).
    pub async fn run_bounded(
        &self,
        command: &str,
        cwd: Option<&Path>,
        timeout: Duration,
    ) -> ExecutionResult {
        // Waiting for a permit does not count against the command's timeout
        let _permit = match self.limiter.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return ExecutionResult::spawn_failure("process limiter closed"),
        };

        let cwd = cwd.unwrap_or(&self.default_dir);
        let cap = self.constraints.max_output_bytes;

        debug!(
            command = %command.chars().take(100).collect::<String>(),
            cwd = %cwd.display(),
            timeout_secs = timeout.as_secs_f64(),
            "spawning process"
        );

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(command)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let start = Instant::now();
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                error!(shell = %self.shell, cwd = %cwd.display(), error = %e, "failed to spawn process");
                return ExecutionResult::spawn_failure(e.to_string());
            }
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let mut out_buf = Vec::new();
        let mut err_buf = Vec::new();

        let outcome = {
            let io = async {
                let (_, _, status) = tokio::join!(
                    read_capped(stdout, &mut out_buf, cap),
                    read_capped(stderr, &mut err_buf, cap),
                    child.wait()
                );
                status
            };
            tokio::time::timeout(timeout, io).await
        };

        let (exit_code, timed_out) = match outcome {
            Ok(Ok(status)) => (status.code().unwrap_or(1), false),
            Ok(Err(e)) => {
                error!(error = %e, "failed to wait for process");
                (1, false)
            }
            Err(_) => {
                warn!(
                    command = %command.chars().take(100).collect::<String>(),
                    timeout_secs = timeout.as_secs_f64(),
                    "process timed out, killing process group"
                );
                kill_process_tree(&mut child);
                let code = match child.wait().await {
                    Ok(status) => status.code().unwrap_or(1),
                    Err(e) => {
                        error!(error = %e, "failed to reap killed process");
                        1
                    }
                };
                (code, true)
            }
        };

        info!(
            command = %command.chars().take(100).collect::<String>(),
            duration_ms = start.elapsed().as_millis() as u64,
            exit_code = exit_code,
            timed_out = timed_out,
            stdout_bytes = out_buf.len(),
            stderr_bytes = err_buf.len(),
            "process finished"
        );

        ExecutionResult {
            stdout: out_buf,
            stderr: err_buf,
            exit_code,
            timed_out,
        }
    }
}

/// Drain a stream to EOF, keeping only the first `cap` bytes.
///
/// Reading continues past the cap so the child never blocks on a full pipe.
async fn read_capped<R: AsyncRead + Unpin>(reader: Option<R>, buf: &mut Vec<u8>, cap: usize) {
    let Some(mut reader) = reader else {
        return;
    };
    let mut chunk = [0u8; READ_CHUNK_BYTES];

    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                let room = cap.saturating_sub(buf.len());
                if room > 0 {
                    buf.extend_from_slice(&chunk[..n.min(room)]);
                }
            }
            Err(e) => {
                debug!(error = %e, "stream read failed");
                break;
            }
        }
    }
}

/// SIGKILL the child's whole process group, then the child itself.
fn kill_process_tree(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // The child leads its own group (process_group(0) at spawn)
        // SAFETY: kill(2) takes plain integers and touches no memory of ours;
        // the group id is the live, unreaped child's pid.
        let rc = unsafe { libc::kill(-(pid as i32), libc::SIGKILL) };
        if rc != 0 {
            debug!(pid = pid, error = %std::io::Error::last_os_error(), "process group kill failed");
        }
    }

    if let Err(e) = child.start_kill() {
        debug!(error = %e, "child kill failed");
    }
}
