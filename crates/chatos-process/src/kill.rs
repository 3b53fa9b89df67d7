//! SIGTERM-then-SIGKILL escalation, shared by the internal timeout handler
//! (§4.5) and external job cancellation (§4.10, §5).

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

/// A lightweight, `Clone`-able reference to a spawned child process, kept in
/// the router's in-memory supervision map (§5) so a cancellation request
/// arriving after the spawn call returns can still reach the OS process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessHandle {
    pid: u32,
}

impl ProcessHandle {
    /// Wrap a child's OS pid.
    #[must_use]
    pub fn new(pid: u32) -> Self {
        Self { pid }
    }

    /// The wrapped pid.
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Send `SIGTERM`, wait up to two seconds, then send `SIGKILL` if the
    /// process is still alive (§4.5, §4.10 `cancel_sub_agent_job`).
    ///
    /// Best-effort: a process that has already exited yields an `ESRCH`
    /// from the kernel, which is not treated as an error here.
    pub async fn terminate_then_kill(&self) {
        send_signal(self.pid, Signal::SIGTERM);
        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
        if is_alive(self.pid) {
            send_signal(self.pid, Signal::SIGKILL);
        }
    }
}

pub(crate) fn send_signal(pid: u32, signal: Signal) {
    #[allow(clippy::cast_possible_wrap)]
    let pid = Pid::from_raw(pid as i32);
    // ESRCH (no such process) just means it already exited; nothing to do.
    let _ = signal::kill(pid, signal);
}

fn is_alive(pid: u32) -> bool {
    #[allow(clippy::cast_possible_wrap)]
    let pid = Pid::from_raw(pid as i32);
    signal::kill(pid, None).is_ok()
}
