//! Sandbox configuration and per-run limits

/// Per-run resource limits
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Wall-clock limit in seconds
    pub timeout_secs: u64,
    /// Memory ceiling in MB (RLIMIT_AS)
    pub memory_mb: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            memory_mb: 512,
        }
    }
}

/// Static sandbox configuration shared by all runs
#[derive(Debug, Clone, Copy)]
pub struct SandboxConfig {
    /// Process count ceiling inside the box (RLIMIT_NPROC)
    pub processes: u64,
    /// Open file descriptor ceiling (RLIMIT_NOFILE)
    pub open_files: u64,
    /// Max file size writable inside the box, in KB (RLIMIT_FSIZE)
    pub fsize_kb: u64,
    /// Cap on captured stdout/stderr, in bytes
    pub max_output_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            processes: 256,
            open_files: 256,
            fsize_kb: 262_144, // 256MB max file size
            max_output_bytes: 262_144,
        }
    }
}
