//! Process execution utilities with timeout support
//!
//! External engines (yt-dlp) are started as the leader of their own process
//! group. Whenever the run ends (normal exit, deadline, or the future being
//! dropped) the whole group gets SIGKILL, which also takes down helpers the
//! engine forked, such as ffmpeg during a merge. On the deadline path the
//! engine is reaped before the error is returned.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::core::error::{AppError, AppResult};

/// How much of stderr is kept for the log line
const STDERR_TAIL_BYTES: usize = 2048;

/// Result of a process that finished before its deadline
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    /// Last bytes of stderr, lossily decoded
    pub stderr_tail: String,
}

/// SIGKILLs the process group led by `pgid` when dropped.
struct GroupGuard {
    pgid: Option<u32>,
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_group(pgid);
        }
    }
}

#[cfg(unix)]
fn kill_group(pgid: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pgid) else {
        return;
    };
    match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) => log::debug!("Killed process group {}", pgid),
        // Nobody left in the group
        Err(Errno::ESRCH) => {}
        Err(e) => log::warn!("Failed to kill process group {}: {}", pgid, e),
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}

/// Runs `cmd` to completion, killing it after `timeout`.
///
/// stdout is discarded, stdin is closed, stderr is collected in the
/// background and truncated to its tail.
///
/// # Errors
/// * `AppError::Io` - the process could not be spawned or waited on
/// * `AppError::FetchTimeout` - the deadline passed; the process group is dead
pub async fn run_with_timeout(mut cmd: Command, timeout: Duration) -> AppResult<ProcessOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd.spawn()?;
    let pid = child.id();
    let group = GroupGuard { pgid: pid };

    let stderr_task = child.stderr.take().map(|mut stderr| {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
            buf
        })
    });

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(status) => {
            let status = status?;
            // Stragglers would keep the stderr pipe open
            drop(group);
            let stderr = match stderr_task {
                Some(task) => task.await.unwrap_or_default(),
                None => Vec::new(),
            };
            Ok(ProcessOutput {
                status,
                stderr_tail: tail(&stderr),
            })
        }
        Err(_) => {
            log::error!(
                "Process {:?} timed out after {}s, killing",
                pid,
                timeout.as_secs()
            );
            drop(group);
            // kill() also waits, so the child is reaped here
            if let Err(e) = child.kill().await {
                log::warn!("Failed to kill process {:?}: {}", pid, e);
            }
            if let Some(task) = stderr_task {
                task.abort();
            }
            Err(AppError::FetchTimeout(timeout))
        }
    }
}

fn tail(bytes: &[u8]) -> String {
    let start = bytes.len().saturating_sub(STDERR_TAIL_BYTES);
    String::from_utf8_lossy(&bytes[start..]).trim().to_string()
}

/// Waits until `pid` has exited (gone or a zombie), up to `within`.
#[cfg(all(test, target_os = "linux"))]
pub(crate) async fn wait_for_exit(pid: &str, within: Duration) -> bool {
    let stat = std::path::PathBuf::from("/proc").join(pid.trim()).join("stat");
    let deadline = std::time::Instant::now() + within;
    loop {
        let running = match std::fs::read_to_string(&stat) {
            // State is the first field after the parenthesised command name
            Ok(line) => line
                .rsplit_once(')')
                .and_then(|(_, rest)| rest.trim_start().chars().next())
                .is_some_and(|state| state != 'Z' && state != 'X'),
            Err(_) => false,
        };
        if !running {
            return true;
        }
        if std::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
