//! Test runner - executes generated test cases against a submission
//!
//! Every test case gets its own independent sandbox run (own scratch
//! directory, own timeout), so one hanging case cannot block or corrupt
//! another. Cases are dispatched concurrently and results are returned in
//! input order. A failed sandbox run is recorded as a failed case, never
//! surfaced as an error.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinSet;
use tracing::warn;

use crate::executor::{Executor, RunSpec};
use crate::model::{SandboxStatus, TestCase, TestCaseResult};
use crate::sandbox::Limits;

pub struct TestRunner {
    executor: Arc<dyn Executor>,
}

impl TestRunner {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }

    /// Run all test cases, returning one result per case in input order
    pub async fn run(
        &self,
        code: &str,
        test_cases: &[TestCase],
        language: &str,
        dependencies: &BTreeSet<String>,
        entry_point: Option<&str>,
        limits: Limits,
    ) -> Vec<TestCaseResult> {
        let mut join_set = JoinSet::new();

        for (idx, case) in test_cases.iter().enumerate() {
            let executor = Arc::clone(&self.executor);
            let code = code.to_string();
            let language = language.to_string();
            let dependencies = dependencies.clone();
            let entry_point = entry_point.map(|s| s.to_string());
            let case = case.clone();

            join_set.spawn(async move {
                let stdin = stdin_payload(&case.input);
                let spec = RunSpec {
                    code: &code,
                    language: &language,
                    dependencies: &dependencies,
                    entry_point: entry_point.as_deref(),
                    stdin: Some(&stdin),
                    limits,
                };
                let run = executor.run(&spec).await;
                (idx, evaluate_case(&case, run))
            });
        }

        let mut results: Vec<Option<TestCaseResult>> = vec![None; test_cases.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((idx, result)) => results[idx] = Some(result),
                Err(e) => warn!("Test case task panicked: {}", e),
            }
        }

        // A panicked task leaves a hole; record it as a failed case so the
        // result list always matches the input list.
        results
            .into_iter()
            .enumerate()
            .map(|(idx, slot)| {
                slot.unwrap_or_else(|| TestCaseResult {
                    description: test_cases[idx].description.clone(),
                    input: test_cases[idx].input.clone(),
                    expected_output: test_cases[idx].expected_output.clone(),
                    actual_output: Value::Null,
                    passed: false,
                    error: Some("test case execution aborted".into()),
                })
            })
            .collect()
    }
}

fn evaluate_case(case: &TestCase, run: crate::model::SandboxRunResult) -> TestCaseResult {
    let (passed, actual_output, error) = if run.status == SandboxStatus::Ok {
        let actual = actual_value(&run.stdout);
        let passed = outputs_match(&run.stdout, &case.expected_output);
        (passed, actual, None)
    } else {
        let error = if run.stderr.trim().is_empty() {
            run.status.to_string()
        } else {
            format!("{}: {}", run.status, run.stderr.trim())
        };
        (false, Value::Null, Some(error))
    };

    TestCaseResult {
        description: case.description.clone(),
        input: case.input.clone(),
        expected_output: case.expected_output.clone(),
        actual_output,
        passed,
        error,
    }
}

/// Serialize a structured test input for the program's stdin
fn stdin_payload(input: &Value) -> String {
    match input {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parse captured stdout back into a structured value where possible
fn actual_value(stdout: &str) -> Value {
    let trimmed = stdout.trim();
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}

/// Compare program output with an expected structured value
fn outputs_match(stdout: &str, expected: &Value) -> bool {
    match expected {
        Value::String(s) => compare_output(stdout, s),
        other => {
            if let Ok(actual) = serde_json::from_str::<Value>(stdout.trim()) {
                &actual == other
            } else {
                compare_output(stdout, &other.to_string())
            }
        }
    }
}

/// Compare program output with expected output
pub fn compare_output(actual: &str, expected: &str) -> bool {
    // Normalize outputs: trim trailing whitespace from each line and trailing newlines
    let normalize = |s: &str| -> Vec<String> {
        s.lines()
            .map(|line| line.trim_end().to_string())
            .collect::<Vec<_>>()
    };

    let actual_lines = normalize(actual);
    let expected_lines = normalize(expected);

    // Remove trailing empty lines
    let trim_trailing = |lines: Vec<String>| -> Vec<String> {
        let mut lines = lines;
        while lines.last().map(|s| s.is_empty()).unwrap_or(false) {
            lines.pop();
        }
        lines
    };

    let actual_lines = trim_trailing(actual_lines);
    let expected_lines = trim_trailing(expected_lines);

    actual_lines == expected_lines
}
