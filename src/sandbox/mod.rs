//! Sandbox module - low-level process isolation
//!
//! This module provides a minimal abstraction over a resource-capped
//! subprocess run. It handles:
//! - Scratch-directory scoped process lifecycle
//! - OS resource limits (address space, CPU backstop, files, processes)
//! - Hard wall-clock enforcement via process-group SIGKILL
//! - Capped stdout/stderr capture
//!
//! The sandbox module does NOT:
//! - Interpret verdicts (that's the executor's job)
//! - Know about languages or test cases
//! - Compare outputs

pub mod config;
pub mod proc_box;

// Re-exports for convenience
pub use config::{Limits, SandboxConfig};
pub use proc_box::{BoxOutcome, BoxStatus, ProcessBox};
