//! Sandbox executor - runs one code submission in a fresh box
//!
//! Sits between the verification loop and the low-level process box:
//! writes the source into a disposable scratch directory, runs the
//! language's command under resource limits, and maps the raw outcome to
//! a structured `SandboxRunResult`. In-sandbox failures are never errors;
//! only a context that could not be created yields `setup_error`.

use std::collections::BTreeSet;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::languages;
use crate::model::{SandboxRunResult, SandboxStatus};
use crate::sandbox::{BoxOutcome, BoxStatus, Limits, ProcessBox, SandboxConfig};

const SIGKILL: i32 = 9;
const SIGSEGV: i32 = 11;
const SIGXCPU: i32 = 24;

/// Executor seam; the loop and the test runner only see this trait
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run one code submission with its own isolated context and limits
    async fn run(&self, spec: &RunSpec<'_>) -> SandboxRunResult;
}

/// Everything one sandbox run needs
#[derive(Debug, Clone)]
pub struct RunSpec<'a> {
    pub code: &'a str,
    pub language: &'a str,
    pub dependencies: &'a BTreeSet<String>,
    pub entry_point: Option<&'a str>,
    pub stdin: Option<&'a str>,
    pub limits: Limits,
}

/// Executor backed by the process sandbox
pub struct SandboxExecutor {
    config: SandboxConfig,
}

impl SandboxExecutor {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    async fn run_in_box(&self, spec: &RunSpec<'_>) -> anyhow::Result<BoxOutcome> {
        let lang = languages::get_language_config(spec.language)
            .ok_or_else(|| anyhow::anyhow!("Unsupported language: {}", spec.language))?;

        // Fresh scratch directory per run; dropped on every exit path.
        let work_dir = tempfile::tempdir()?;

        let source_file = spec.entry_point.unwrap_or(&lang.source_file);
        tokio::fs::write(work_dir.path().join(source_file), spec.code).await?;

        let command = lang.run_command_for(source_file);

        // Network stays off unless the request declares dependencies that
        // need to be fetched at run time.
        let allow_network = !spec.dependencies.is_empty();

        let pbox = ProcessBox::new(work_dir.path(), spec.limits, self.config)
            .with_network(allow_network);
        pbox.run(&command, spec.stdin).await
    }
}

#[async_trait]
impl Executor for SandboxExecutor {
    async fn run(&self, spec: &RunSpec<'_>) -> SandboxRunResult {
        match self.run_in_box(spec).await {
            Ok(outcome) => {
                debug!(
                    "Sandbox run finished: status={:?}, duration_ms={}",
                    outcome.status, outcome.duration_ms
                );
                map_outcome(outcome)
            }
            Err(e) => {
                warn!("Sandbox context could not be created: {:#}", e);
                SandboxRunResult::setup_error(format!("{:#}", e))
            }
        }
    }
}

// Interpreters trap the refused allocation and exit with an ordinary
// error code, so the memory verdict has to be read off stderr rather
// than a signal.
const ALLOC_DENIED_MARKERS: [&str; 5] = [
    "MemoryError",
    "heap out of memory",
    "Cannot allocate memory",
    "ENOMEM",
    "std::bad_alloc",
];

fn allocation_denied(stderr: &str) -> bool {
    ALLOC_DENIED_MARKERS.iter().any(|m| stderr.contains(m))
}

fn map_outcome(outcome: BoxOutcome) -> SandboxRunResult {
    let (status, exit_code) = match outcome.status {
        BoxStatus::Exited(0) => (SandboxStatus::Ok, Some(0)),
        BoxStatus::Exited(code) if allocation_denied(&outcome.stderr) => {
            (SandboxStatus::ResourceExceeded, Some(code))
        }
        BoxStatus::Exited(code) => (SandboxStatus::RuntimeError, Some(code)),
        BoxStatus::TimedOut => (SandboxStatus::Timeout, None),
        // SIGXCPU is the CPU rlimit backstop firing before the watchdog.
        BoxStatus::Signaled(SIGXCPU) => (SandboxStatus::Timeout, Some(128 + SIGXCPU)),
        // Runtimes that do not trap the refused allocation get killed or
        // faulted instead.
        BoxStatus::Signaled(sig @ (SIGKILL | SIGSEGV)) => {
            (SandboxStatus::ResourceExceeded, Some(128 + sig))
        }
        BoxStatus::Signaled(sig) => (SandboxStatus::RuntimeError, Some(128 + sig)),
    };

    SandboxRunResult {
        status,
        stdout: outcome.stdout,
        stderr: outcome.stderr,
        exit_code,
        duration_ms: outcome.duration_ms,
    }
}
