//! Collaborator interfaces
//!
//! The worker consumes two external code-generation collaborators (test
//! generation and repair) and a fire-and-forget notification sink. Each is
//! behind a narrow trait; collaborator failures degrade, they never
//! propagate out of the verification flow.

pub mod notify;
pub mod regen;
pub mod testgen;

use async_trait::async_trait;
use serde::Serialize;

use crate::model::{AttemptRecord, SandboxStatus, TestCase, TestCaseResult};

/// Structured evidence bundle sent with a repair request
#[derive(Debug, Clone, Serialize)]
pub struct FailureEvidence {
    pub status: SandboxStatus,
    pub stdout: String,
    pub stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub failing_tests: Vec<TestCaseResult>,
}

impl FailureEvidence {
    /// Collect the evidence from a failed attempt
    pub fn from_attempt(record: &AttemptRecord) -> Self {
        Self {
            status: record.sandbox_result.status,
            stdout: record.sandbox_result.stdout.clone(),
            stderr: record.sandbox_result.stderr.clone(),
            exit_code: record.sandbox_result.exit_code,
            failing_tests: record
                .test_results
                .iter()
                .filter(|t| !t.passed)
                .cloned()
                .collect(),
        }
    }
}

/// Requests test cases for a piece of code from a collaborator
#[async_trait]
pub trait TestGenerator: Send + Sync {
    /// Returns an empty sequence when the collaborator is unavailable
    async fn generate(&self, code: &str, language: &str) -> Vec<TestCase>;
}

/// Requests a replacement candidate for failing code from a collaborator
#[async_trait]
pub trait Regenerator: Send + Sync {
    /// Returns None when no usable candidate is available
    async fn repair(
        &self,
        previous_code: &str,
        language: &str,
        evidence: &FailureEvidence,
    ) -> Option<String>;
}

// Re-exports
pub use notify::Notifier;
pub use regen::HttpRegenerator;
pub use testgen::HttpTestGenerator;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SandboxRunResult;
    use serde_json::json;

    #[test]
    fn test_evidence_keeps_only_failing_tests() {
        let record = AttemptRecord {
            attempt: 1,
            code: "x".into(),
            sandbox_result: SandboxRunResult {
                status: SandboxStatus::Ok,
                stdout: "out".into(),
                stderr: String::new(),
                exit_code: Some(0),
                duration_ms: 1,
            },
            test_results: vec![
                TestCaseResult {
                    description: "pass".into(),
                    input: json!(1),
                    expected_output: json!(1),
                    actual_output: json!(1),
                    passed: true,
                    error: None,
                },
                TestCaseResult {
                    description: "fail".into(),
                    input: json!(2),
                    expected_output: json!(2),
                    actual_output: json!(3),
                    passed: false,
                    error: None,
                },
            ],
        };

        let evidence = FailureEvidence::from_attempt(&record);
        assert_eq!(evidence.failing_tests.len(), 1);
        assert_eq!(evidence.failing_tests[0].description, "fail");
    }
}
