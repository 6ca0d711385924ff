//! Data model for verification requests and results

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::languages;

/// Outcome of a single sandbox run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxStatus {
    Ok,
    RuntimeError,
    Timeout,
    ResourceExceeded,
    SetupError,
}

impl fmt::Display for SandboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SandboxStatus::Ok => "ok",
            SandboxStatus::RuntimeError => "runtime_error",
            SandboxStatus::Timeout => "timeout",
            SandboxStatus::ResourceExceeded => "resource_exceeded",
            SandboxStatus::SetupError => "setup_error",
        };
        write!(f, "{}", s)
    }
}

/// Terminal status of a verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalStatus {
    Verified,
    Failed,
    Timeout,
}

impl fmt::Display for FinalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FinalStatus::Verified => "verified",
            FinalStatus::Failed => "failed",
            FinalStatus::Timeout => "timeout",
        };
        write!(f, "{}", s)
    }
}

/// One generated test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: serde_json::Value,
    pub expected_output: serde_json::Value,
    #[serde(default)]
    pub description: String,
}

/// Result of running one test case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCaseResult {
    #[serde(default)]
    pub description: String,
    pub input: serde_json::Value,
    pub expected_output: serde_json::Value,
    pub actual_output: serde_json::Value,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a single sandbox run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxRunResult {
    pub status: SandboxStatus,
    pub stdout: String,
    pub stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
}

impl SandboxRunResult {
    /// Build a setup_error result for a context that could not be created
    pub fn setup_error(message: impl Into<String>) -> Self {
        Self {
            status: SandboxStatus::SetupError,
            stdout: String::new(),
            stderr: message.into(),
            exit_code: None,
            duration_ms: 0,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == SandboxStatus::Ok
    }
}

/// One pass through sandbox execution within a verification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// 1-indexed attempt number
    pub attempt: u32,
    /// Code used for this attempt
    pub code: String,
    pub sandbox_result: SandboxRunResult,
    /// Empty if no test cases were run
    #[serde(default)]
    pub test_results: Vec<TestCaseResult>,
}

impl AttemptRecord {
    /// Attempt succeeded: sandbox ok and every test case passed
    pub fn is_success(&self) -> bool {
        self.sandbox_result.is_ok() && self.test_results.iter().all(|t| t.passed)
    }
}

/// Verification request submitted by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub code: String,
    pub language: String,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,
    /// Per-request overrides; service defaults apply when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_limit_mb: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

impl ExecutionRequest {
    /// Reject invalid requests before any sandbox work begins
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.code.trim().is_empty() {
            return Err(ValidationError::new("code must not be empty"));
        }
        if languages::get_language_config(&self.language).is_none() {
            return Err(ValidationError::new(format!(
                "unsupported language: {} (supported: {})",
                self.language,
                languages::get_supported_languages().join(", ")
            )));
        }
        if let Some(entry) = &self.entry_point {
            if entry.trim().is_empty() || entry.contains('/') || entry.contains("..") {
                return Err(ValidationError::new("entry_point must be a plain file name"));
            }
        }
        if self.timeout_seconds == Some(0) {
            return Err(ValidationError::new("timeout_seconds must be at least 1"));
        }
        if self.memory_limit_mb == Some(0) {
            return Err(ValidationError::new("memory_limit_mb must be at least 1"));
        }
        if self.max_retries == Some(0) {
            return Err(ValidationError::new("max_retries must be at least 1"));
        }
        Ok(())
    }
}

/// Completed verification; never mutated after completed_at is set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub id: Uuid,
    pub final_status: FinalStatus,
    /// Number of attempts, always equal to all_results.len()
    pub attempts: u32,
    pub all_results: Vec<AttemptRecord>,
    pub created_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl VerificationResult {
    /// Render a human-readable summary of the verification
    pub fn report(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Verification {}\n", self.id));
        out.push_str(&format!("Status: {}\n", self.final_status));
        out.push_str(&format!("Attempts: {}\n", self.attempts));

        for record in &self.all_results {
            let passed = record.test_results.iter().filter(|t| t.passed).count();
            let total = record.test_results.len();
            if total > 0 {
                out.push_str(&format!(
                    "  Attempt {}: sandbox={}, tests {}/{} passed\n",
                    record.attempt, record.sandbox_result.status, passed, total
                ));
            } else {
                out.push_str(&format!(
                    "  Attempt {}: sandbox={}, no test cases\n",
                    record.attempt, record.sandbox_result.status
                ));
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(code: &str, language: &str) -> ExecutionRequest {
        ExecutionRequest {
            code: code.into(),
            language: language.into(),
            test_cases: vec![],
            dependencies: BTreeSet::new(),
            entry_point: None,
            timeout_seconds: None,
            memory_limit_mb: None,
            max_retries: None,
        }
    }

    #[test]
    fn test_validate_rejects_empty_code() {
        crate::languages::ensure_loaded();
        assert!(request("  \n", "python").validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_language() {
        crate::languages::ensure_loaded();
        let err = request("print(1)", "fortran").validate().unwrap_err();
        // The rejection names what the service does accept.
        assert!(err.to_string().contains("supported: "));
        assert!(err.to_string().contains("python"));
    }

    #[test]
    fn test_validate_rejects_zero_retries() {
        crate::languages::ensure_loaded();
        let mut req = request("print(1)", "python");
        req.max_retries = Some(0);
        assert!(req.validate().is_err());
        req.max_retries = Some(1);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_path_entry_point() {
        crate::languages::ensure_loaded();
        let mut req = request("print(1)", "python");
        req.entry_point = Some("../escape.py".into());
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let status = serde_json::to_value(SandboxStatus::ResourceExceeded).unwrap();
        assert_eq!(status, json!("resource_exceeded"));
        let status = serde_json::to_value(FinalStatus::Verified).unwrap();
        assert_eq!(status, json!("verified"));
    }

    #[test]
    fn test_attempt_success_requires_all_tests_passed() {
        let sandbox_result = SandboxRunResult {
            status: SandboxStatus::Ok,
            stdout: "42\n".into(),
            stderr: String::new(),
            exit_code: Some(0),
            duration_ms: 5,
        };
        let passing = TestCaseResult {
            description: String::new(),
            input: json!(1),
            expected_output: json!(2),
            actual_output: json!(2),
            passed: true,
            error: None,
        };
        let failing = TestCaseResult {
            passed: false,
            ..passing.clone()
        };

        let record = AttemptRecord {
            attempt: 1,
            code: "x".into(),
            sandbox_result: sandbox_result.clone(),
            test_results: vec![passing.clone()],
        };
        assert!(record.is_success());

        let record = AttemptRecord {
            attempt: 1,
            code: "x".into(),
            sandbox_result,
            test_results: vec![passing, failing],
        };
        assert!(!record.is_success());
    }

    #[test]
    fn test_report_counts() {
        let result = VerificationResult {
            id: Uuid::nil(),
            final_status: FinalStatus::Failed,
            attempts: 1,
            all_results: vec![AttemptRecord {
                attempt: 1,
                code: "x".into(),
                sandbox_result: SandboxRunResult::setup_error("boom"),
                test_results: vec![],
            }],
            created_at: Utc::now(),
            completed_at: Utc::now(),
        };
        let report = result.report();
        assert!(report.contains("Status: failed"));
        assert!(report.contains("Attempts: 1"));
        assert!(report.contains("sandbox=setup_error"));
    }
}
