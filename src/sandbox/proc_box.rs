//! Disposable process box
//!
//! Runs one command as a subprocess in its own session, capped by OS
//! resource limits, inside a caller-provided scratch directory. The
//! wall-clock deadline is enforced by killing the whole process group
//! with SIGKILL; a hung program cannot ignore it.

use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::debug;

use super::config::{Limits, SandboxConfig};

/// Raw status of a boxed run, before any verdict interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxStatus {
    /// Process exited normally with the given code
    Exited(i32),
    /// Process was killed by the given signal
    Signaled(i32),
    /// Process group was killed at the wall-clock deadline
    TimedOut,
}

/// Outcome of a boxed run
#[derive(Debug)]
pub struct BoxOutcome {
    pub status: BoxStatus,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

/// A disposable process sandbox rooted in a scratch directory.
///
/// The scratch directory is owned by the caller (a TempDir in practice),
/// so teardown happens on every exit path including panics.
pub struct ProcessBox {
    work_dir: PathBuf,
    limits: Limits,
    config: SandboxConfig,
    allow_network: bool,
}

impl ProcessBox {
    pub fn new(work_dir: impl AsRef<Path>, limits: Limits, config: SandboxConfig) -> Self {
        Self {
            work_dir: work_dir.as_ref().to_path_buf(),
            limits,
            config,
            allow_network: false,
        }
    }

    pub fn with_network(mut self, allow: bool) -> Self {
        self.allow_network = allow;
        self
    }

    /// Run a command inside the box with an optional stdin payload.
    ///
    /// Returns Err only when the process could not be spawned or waited on;
    /// timeouts, crashes, and non-zero exits are reported in the outcome.
    pub async fn run(&self, command: &[String], stdin_content: Option<&str>) -> Result<BoxOutcome> {
        let program = command
            .first()
            .context("No command specified for sandboxed run")?;

        let mut cmd = Command::new(program);
        cmd.args(&command[1..])
            .current_dir(&self.work_dir)
            .env_clear()
            .env("PATH", "/usr/local/bin:/usr/bin:/bin")
            .env("HOME", &self.work_dir)
            .stdin(if stdin_content.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let limits = self.limits;
        let config = self.config;
        let allow_network = self.allow_network;
        unsafe {
            cmd.pre_exec(move || {
                // New session: the child leads its own process group, so a
                // later killpg reaches the entire process tree.
                nix::unistd::setsid().map_err(io_error)?;
                if !allow_network {
                    // Network namespace isolation needs privileges; degrade
                    // silently where unavailable, the rlimits still apply.
                    let _ = nix::sched::unshare(nix::sched::CloneFlags::CLONE_NEWNET);
                }
                apply_rlimits(&limits, &config).map_err(io_error)?;
                Ok(())
            });
        }

        debug!("Spawning sandboxed command: {:?}", command);
        let start = Instant::now();
        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn sandboxed process: {}", program))?;

        let pgid = child.id().map(|pid| Pid::from_raw(pid as i32));

        if let (Some(content), Some(mut stdin)) = (stdin_content, child.stdin.take()) {
            // A broken pipe here means the child exited early; not an error.
            let _ = stdin.write_all(content.as_bytes()).await;
            let _ = stdin.shutdown().await;
        }

        let stdout_task = spawn_capped_reader(child.stdout.take(), self.config.max_output_bytes);
        let stderr_task = spawn_capped_reader(child.stderr.take(), self.config.max_output_bytes);

        let deadline = Duration::from_secs(self.limits.timeout_secs);
        let (status, timed_out) = match tokio::time::timeout(deadline, child.wait()).await {
            Ok(result) => {
                let status = result.context("Failed to wait for sandboxed process")?;
                (Some(status), false)
            }
            Err(_) => {
                if let Some(pgid) = pgid {
                    let _ = killpg(pgid, Signal::SIGKILL);
                }
                let _ = child.wait().await;
                (None, true)
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let stdout = join_reader(stdout_task).await;
        let stderr = join_reader(stderr_task).await;

        let status = if timed_out {
            BoxStatus::TimedOut
        } else {
            match status {
                Some(s) => match s.code() {
                    Some(code) => BoxStatus::Exited(code),
                    None => BoxStatus::Signaled(s.signal().unwrap_or(0)),
                },
                None => BoxStatus::TimedOut,
            }
        };

        Ok(BoxOutcome {
            status,
            stdout,
            stderr,
            duration_ms,
        })
    }
}

/// Read a pipe to the end, keeping at most `cap` bytes.
///
/// Keeps draining past the cap so a chatty child never blocks on a full pipe.
fn spawn_capped_reader<R>(pipe: Option<R>, cap: usize) -> Option<JoinHandle<String>>
where
    R: AsyncReadExt + Unpin + Send + 'static,
{
    let mut pipe = pipe?;
    Some(tokio::spawn(async move {
        let mut buf: Vec<u8> = Vec::new();
        let mut chunk = [0u8; 8192];
        loop {
            match pipe.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if buf.len() < cap {
                        let take = n.min(cap - buf.len());
                        buf.extend_from_slice(&chunk[..take]);
                    }
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }))
}

async fn join_reader(task: Option<JoinHandle<String>>) -> String {
    match task {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    }
}

fn apply_rlimits(limits: &Limits, config: &SandboxConfig) -> nix::Result<()> {
    use nix::sys::resource::{setrlimit, Resource};

    let memory_bytes = limits.memory_mb * 1024 * 1024;
    setrlimit(Resource::RLIMIT_AS, memory_bytes, memory_bytes)?;

    // CPU backstop behind the wall-clock watchdog: SIGXCPU at the soft
    // limit, SIGKILL one second later.
    let cpu_secs = limits.timeout_secs.max(1);
    setrlimit(Resource::RLIMIT_CPU, cpu_secs, cpu_secs + 1)?;

    setrlimit(Resource::RLIMIT_CORE, 0, 0)?;
    let fsize_bytes = config.fsize_kb * 1024;
    setrlimit(Resource::RLIMIT_FSIZE, fsize_bytes, fsize_bytes)?;
    setrlimit(Resource::RLIMIT_NOFILE, config.open_files, config.open_files)?;
    setrlimit(Resource::RLIMIT_NPROC, config.processes, config.processes)?;

    Ok(())
}

fn io_error(errno: nix::errno::Errno) -> std::io::Error {
    std::io::Error::from_raw_os_error(errno as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_limits() -> Limits {
        Limits {
            timeout_secs: 5,
            memory_mb: 512,
        }
    }

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let pbox = ProcessBox::new(dir.path(), test_limits(), SandboxConfig::default());
        let cmd = vec!["/bin/sh".to_string(), "-c".to_string(), "echo hello".to_string()];

        let outcome = pbox.run(&cmd, None).await.unwrap();
        assert_eq!(outcome.status, BoxStatus::Exited(0));
        assert_eq!(outcome.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_run_reports_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let pbox = ProcessBox::new(dir.path(), test_limits(), SandboxConfig::default());
        let cmd = vec!["/bin/sh".to_string(), "-c".to_string(), "exit 3".to_string()];

        let outcome = pbox.run(&cmd, None).await.unwrap();
        assert_eq!(outcome.status, BoxStatus::Exited(3));
    }

    #[tokio::test]
    async fn test_run_feeds_stdin() {
        let dir = tempfile::tempdir().unwrap();
        let pbox = ProcessBox::new(dir.path(), test_limits(), SandboxConfig::default());
        let cmd = vec!["/bin/cat".to_string()];

        let outcome = pbox.run(&cmd, Some("piped input")).await.unwrap();
        assert_eq!(outcome.status, BoxStatus::Exited(0));
        assert_eq!(outcome.stdout, "piped input");
    }

    #[tokio::test]
    async fn test_wall_clock_kill() {
        let dir = tempfile::tempdir().unwrap();
        let limits = Limits {
            timeout_secs: 1,
            memory_mb: 512,
        };
        let pbox = ProcessBox::new(dir.path(), limits, SandboxConfig::default());
        let cmd = vec!["/bin/sleep".to_string(), "30".to_string()];

        let start = Instant::now();
        let outcome = pbox.run(&cmd, None).await.unwrap();
        assert_eq!(outcome.status, BoxStatus::TimedOut);
        // The kill is forceful; nowhere near the 30s the program asked for.
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let pbox = ProcessBox::new(dir.path(), test_limits(), SandboxConfig::default());
        let cmd = vec!["/nonexistent/binary".to_string()];

        assert!(pbox.run(&cmd, None).await.is_err());
    }
}
