//! Spawning, bounded output capture, timeout escalation, and result
//! assembly for one child-process run (§4.5).

use std::process::Stdio;

use chrono::{DateTime, Utc};
use nix::sys::signal::Signal;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::time::{Duration, timeout};

use crate::context::{CommandSpec, SpawnContext};
use crate::error::{ProcessError, ProcessResult};
use crate::kill::{ProcessHandle, send_signal};

/// Per-run timeout and output-cap budget (§4.5). `None` or `Some(0)` means
/// unbounded/no timeout, mirroring the spec's "0 or non-finite ⇒
/// unbounded".
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Wall-clock budget before SIGTERM is sent.
    pub timeout_ms: Option<u64>,
    /// Per-stream byte cap on captured stdout/stderr.
    pub max_output_bytes: Option<u64>,
}

/// The outcome of one child-process run (§4.5).
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Captured standard output (UTF-8 lossy).
    pub stdout: String,
    /// Captured standard error (UTF-8 lossy).
    pub stderr: String,
    /// Process exit code, if it exited normally.
    pub exit_code: Option<i32>,
    /// Signal that terminated the process, if any.
    pub signal: Option<i32>,
    /// When the process was spawned.
    pub started_at: DateTime<Utc>,
    /// When the run finished (success, failure, or kill).
    pub finished_at: DateTime<Utc>,
    /// Wall-clock duration of the run, in milliseconds.
    pub duration_ms: u64,
    /// Whether stdout was truncated by the output cap.
    pub stdout_truncated: bool,
    /// Whether stderr was truncated by the output cap.
    pub stderr_truncated: bool,
    /// A spawn/wait-level error, if one occurred (distinct from a non-zero
    /// exit code, which is not itself an error).
    pub error: Option<String>,
    /// Set iff the timeout timer fired.
    pub timed_out: bool,
}

impl RunResult {
    /// Success iff there was no error, no timeout, and exit code 0 (§4.5).
    #[must_use]
    pub fn success(&self) -> bool {
        self.error.is_none() && !self.timed_out && self.exit_code == Some(0)
    }
}

/// A running (or about to run) child process: carries the pid for external
/// cancellation (§5) and a handle to await the eventual [`RunResult`].
pub struct RunHandle {
    /// The OS pid, if the process spawned successfully.
    pub pid: Option<u32>,
    /// When the process was spawned.
    pub started_at: DateTime<Utc>,
    join: tokio::task::JoinHandle<RunResult>,
}

impl RunHandle {
    /// A [`ProcessHandle`] for this run, suitable for storing in the job
    /// supervision map (§5, §4.10).
    #[must_use]
    pub fn process_handle(&self) -> Option<ProcessHandle> {
        self.pid.map(ProcessHandle::new)
    }

    /// Await the run to completion.
    ///
    /// # Errors
    ///
    /// Returns a [`ProcessError`] only if the background task itself
    /// panicked; ordinary run failures are carried in `RunResult::error`.
    pub async fn wait(self) -> ProcessResult<RunResult> {
        self.join
            .await
            .map_err(|e| ProcessError::Spawn(std::io::Error::other(e.to_string())))
    }
}

/// Spawn `spec` with `ctx`'s `SUBAGENT_*` environment overlay and begin
/// running it in the background, honoring `opts`'s timeout and output caps.
///
/// # Errors
///
/// Returns [`ProcessError::MissingExec`] if `spec.exec` is empty, or
/// [`ProcessError::Spawn`] if the OS refuses to start the process.
pub async fn spawn(
    spec: &CommandSpec,
    ctx: &SpawnContext,
    opts: &RunOptions,
) -> ProcessResult<RunHandle> {
    spawn_inner(spec, ctx, opts, None).await
}

/// Like [`spawn`], but writes `stdin` to the child once and closes its
/// stdin pipe before awaiting output (§4.5 `runWithInput`).
///
/// # Errors
///
/// Same as [`spawn`].
pub async fn spawn_with_input(
    spec: &CommandSpec,
    ctx: &SpawnContext,
    opts: &RunOptions,
    stdin: Vec<u8>,
) -> ProcessResult<RunHandle> {
    spawn_inner(spec, ctx, opts, Some(stdin)).await
}

async fn spawn_inner(
    spec: &CommandSpec,
    ctx: &SpawnContext,
    opts: &RunOptions,
    stdin_payload: Option<Vec<u8>>,
) -> ProcessResult<RunHandle> {
    if spec.exec.is_empty() {
        return Err(ProcessError::MissingExec);
    }

    let mut command = Command::new(&spec.exec[0]);
    command.args(&spec.exec[1..]);
    command.current_dir(
        spec.cwd
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_default()),
    );
    for (key, value) in &spec.env {
        command.env(key, value);
    }
    for (key, value) in ctx.env_vars() {
        command.env(key, value);
    }
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());
    command.stdin(if stdin_payload.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    command.kill_on_drop(true);

    let mut child = command.spawn()?;
    let pid = child.id();
    let started_at = Utc::now();

    if let Some(payload) = stdin_payload {
        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(&payload).await;
            let _ = stdin.shutdown().await;
        }
    }

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let max_output_bytes = opts.max_output_bytes;
    let timeout_ms = opts.timeout_ms;

    let join = tokio::spawn(async move {
        let stdout_fut = capture(stdout, max_output_bytes);
        let stderr_fut = capture(stderr, max_output_bytes);
        let wait_fut = wait_with_escalation(child, pid, timeout_ms);

        let ((stdout_text, stdout_truncated), (stderr_text, stderr_truncated), wait_outcome) =
            tokio::join!(stdout_fut, stderr_fut, wait_fut);

        let finished_at = Utc::now();
        let duration_ms = (finished_at - started_at).num_milliseconds().max(0) as u64;

        RunResult {
            stdout: stdout_text,
            stderr: stderr_text,
            exit_code: wait_outcome.exit_code,
            signal: wait_outcome.signal,
            started_at,
            finished_at,
            duration_ms,
            stdout_truncated,
            stderr_truncated,
            error: wait_outcome.error,
            timed_out: wait_outcome.timed_out,
        }
    });

    Ok(RunHandle {
        pid,
        started_at,
        join,
    })
}

struct WaitOutcome {
    exit_code: Option<i32>,
    signal: Option<i32>,
    error: Option<String>,
    timed_out: bool,
}

/// Wait for `child` to exit, escalating to SIGTERM then (2s later) SIGKILL
/// if `timeout_ms` elapses first (§4.5, §5).
async fn wait_with_escalation(
    mut child: Child,
    pid: Option<u32>,
    timeout_ms: Option<u64>,
) -> WaitOutcome {
    let budget = timeout_ms.filter(|&ms| ms > 0).map(Duration::from_millis);

    let Some(budget) = budget else {
        return finish(child.wait().await, false);
    };

    match timeout(budget, child.wait()).await {
        Ok(status) => finish(status, false),
        Err(_) => {
            if let Some(pid) = pid {
                send_signal(pid, Signal::SIGTERM);
            }
            match timeout(Duration::from_secs(2), child.wait()).await {
                Ok(status) => finish(status, true),
                Err(_) => {
                    if let Some(pid) = pid {
                        send_signal(pid, Signal::SIGKILL);
                    }
                    finish(child.wait().await, true)
                }
            }
        }
    }
}

fn finish(status: std::io::Result<std::process::ExitStatus>, timed_out: bool) -> WaitOutcome {
    use std::os::unix::process::ExitStatusExt;
    match status {
        Ok(status) => WaitOutcome {
            exit_code: status.code(),
            signal: status.signal(),
            error: None,
            timed_out,
        },
        Err(e) => WaitOutcome {
            exit_code: None,
            signal: None,
            error: Some(e.to_string()),
            timed_out,
        },
    }
}

/// Read `reader` to completion, retaining at most `max_bytes` (if set) and
/// draining the remainder so the child is never blocked on a full pipe
/// buffer (§4.5: truncation aborts *capture*, not the child).
async fn capture(
    reader: Option<impl AsyncRead + Unpin>,
    max_bytes: Option<u64>,
) -> (String, bool) {
    let Some(mut reader) = reader else {
        return (String::new(), false);
    };
    let cap = max_bytes.filter(|&b| b > 0);
    let mut buf: Vec<u8> = Vec::new();
    let mut truncated = false;
    let mut chunk = [0_u8; 8192];

    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        match cap {
            None => buf.extend_from_slice(&chunk[..n]),
            Some(cap) => {
                let cap = cap as usize;
                if buf.len() >= cap {
                    truncated = true;
                    continue;
                }
                let remaining = cap.saturating_sub(buf.len());
                let take = remaining.min(n);
                buf.extend_from_slice(&chunk[..take]);
                if take < n {
                    truncated = true;
                }
            }
        }
    }

    (String::from_utf8_lossy(&buf).into_owned(), truncated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn spec(exec: &[&str]) -> CommandSpec {
        CommandSpec {
            exec: exec.iter().map(|s| s.to_string()).collect(),
            cwd: None,
            env: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn runs_command_and_captures_streams() {
        let handle = spawn(
            &spec(&["/bin/sh", "-c", "echo hello; echo err 1>&2; exit 0"]),
            &SpawnContext::default(),
            &RunOptions {
                timeout_ms: Some(5000),
                max_output_bytes: Some(1024),
            },
        )
        .await
        .unwrap();
        let result = handle.wait().await.unwrap();
        assert!(result.success());
        assert!(result.stdout.contains("hello"));
        assert!(result.stderr.contains("err"));
        assert_eq!(result.exit_code, Some(0));
        assert!(!result.timed_out);
        assert!(!result.stdout_truncated);
        assert!(!result.stderr_truncated);
    }

    #[tokio::test]
    async fn missing_exec_fails_fast() {
        let err = spawn(
            &CommandSpec::default(),
            &SpawnContext::default(),
            &RunOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProcessError::MissingExec));
    }

    #[tokio::test]
    async fn timeout_sends_sigterm_then_sigkill() {
        let handle = spawn(
            &spec(&["/bin/sh", "-c", "sleep 10"]),
            &SpawnContext::default(),
            &RunOptions {
                timeout_ms: Some(100),
                max_output_bytes: None,
            },
        )
        .await
        .unwrap();
        let result = handle.wait().await.unwrap();
        assert!(result.timed_out);
        assert!(!result.success());
    }

    #[tokio::test]
    async fn output_cap_truncates_and_sets_flag() {
        let handle = spawn(
            &spec(&["/bin/sh", "-c", "yes x | head -c 100000"]),
            &SpawnContext::default(),
            &RunOptions {
                timeout_ms: Some(5000),
                max_output_bytes: Some(10),
            },
        )
        .await
        .unwrap();
        let result = handle.wait().await.unwrap();
        assert!(result.stdout_truncated);
        assert!(result.stdout.len() <= 10);
    }

    #[tokio::test]
    async fn run_with_input_writes_stdin() {
        let handle = spawn_with_input(
            &spec(&["/bin/cat"]),
            &SpawnContext::default(),
            &RunOptions {
                timeout_ms: Some(5000),
                max_output_bytes: None,
            },
            b"hello stdin".to_vec(),
        )
        .await
        .unwrap();
        let result = handle.wait().await.unwrap();
        assert_eq!(result.stdout, "hello stdin");
    }
}
