//! Verification loop - the bounded execute/repair state machine
//!
//! One logical task per request; attempts are strictly sequential because
//! each attempt's input depends on the previous outcome. Every sandbox and
//! collaborator failure is converted to structured data inside the loop:
//! the only error `verify` can return is request validation.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::cache::{fingerprint, ResultStore};
use crate::collab::{FailureEvidence, Regenerator};
use crate::error::ValidationError;
use crate::executor::{Executor, RunSpec};
use crate::model::{
    AttemptRecord, ExecutionRequest, FinalStatus, SandboxStatus, VerificationResult,
};
use crate::runner::TestRunner;
use crate::sandbox::Limits;

/// Default limits applied when a request carries no overrides
#[derive(Debug, Clone, Copy)]
pub struct LoopDefaults {
    pub timeout_secs: u64,
    pub memory_limit_mb: u64,
    pub max_retries: u32,
}

pub struct VerificationLoop {
    executor: Arc<dyn Executor>,
    runner: TestRunner,
    regenerator: Arc<dyn Regenerator>,
    cache: Option<Arc<dyn ResultStore>>,
    defaults: LoopDefaults,
}

impl VerificationLoop {
    pub fn new(
        executor: Arc<dyn Executor>,
        regenerator: Arc<dyn Regenerator>,
        cache: Option<Arc<dyn ResultStore>>,
        defaults: LoopDefaults,
    ) -> Self {
        let runner = TestRunner::new(Arc::clone(&executor));
        Self {
            executor,
            runner,
            regenerator,
            cache,
            defaults,
        }
    }

    /// Verify one request to a terminal status.
    ///
    /// Always completes with a well-formed result; the request is rejected
    /// up front if invalid, and nothing else escapes the loop.
    pub async fn verify(
        &self,
        request: &ExecutionRequest,
    ) -> Result<VerificationResult, ValidationError> {
        request.validate()?;

        let fp = fingerprint(request);
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&fp).await {
                info!("Verification served from cache: id={}", hit.id);
                return Ok(hit);
            }
        }

        let id = Uuid::new_v4();
        let created_at = Utc::now();
        let limits = Limits {
            timeout_secs: request
                .timeout_seconds
                .unwrap_or(self.defaults.timeout_secs),
            memory_mb: request
                .memory_limit_mb
                .unwrap_or(self.defaults.memory_limit_mb),
        };
        let max_retries = request.max_retries.unwrap_or(self.defaults.max_retries).max(1);

        info!(
            "Verification started: id={}, language={}, tests={}, max_retries={}",
            id,
            request.language,
            request.test_cases.len(),
            max_retries
        );

        let mut code = request.code.clone();
        let mut all_results: Vec<AttemptRecord> = Vec::new();
        let mut final_status: Option<FinalStatus> = None;
        let mut attempt: u32 = 1;

        while attempt <= max_retries {
            let spec = RunSpec {
                code: &code,
                language: &request.language,
                dependencies: &request.dependencies,
                entry_point: request.entry_point.as_deref(),
                stdin: None,
                limits,
            };
            let sandbox_result = self.executor.run(&spec).await;

            // With no tests, success degrades to "executes without error".
            let test_results = if !request.test_cases.is_empty() && sandbox_result.is_ok() {
                self.runner
                    .run(
                        &code,
                        &request.test_cases,
                        &request.language,
                        &request.dependencies,
                        request.entry_point.as_deref(),
                        limits,
                    )
                    .await
            } else {
                vec![]
            };

            let record = AttemptRecord {
                attempt,
                code: code.clone(),
                sandbox_result,
                test_results,
            };
            let success = record.is_success();
            let sandbox_status = record.sandbox_result.status;
            let evidence = FailureEvidence::from_attempt(&record);
            debug!(
                "Attempt {} finished: id={}, sandbox={}, success={}",
                attempt, id, sandbox_status, success
            );
            all_results.push(record);

            if success {
                final_status = Some(FinalStatus::Verified);
                break;
            }

            if sandbox_status == SandboxStatus::Timeout && attempt == max_retries {
                final_status = Some(FinalStatus::Timeout);
                break;
            }

            if attempt == max_retries {
                break;
            }

            match self
                .regenerator
                .repair(&code, &request.language, &evidence)
                .await
            {
                Some(candidate) => {
                    debug!("Repair candidate accepted for id={}", id);
                    code = candidate;
                    attempt += 1;
                }
                None => {
                    // No usable candidate: stop, do not spend further attempts.
                    info!("No repair candidate for id={}; stopping", id);
                    final_status = Some(FinalStatus::Failed);
                    break;
                }
            }
        }

        // Budget exhausted without a decision: classify from the last attempt.
        let final_status = final_status.unwrap_or_else(|| {
            match all_results.last().map(|r| r.sandbox_result.status) {
                Some(SandboxStatus::Timeout) => FinalStatus::Timeout,
                _ => FinalStatus::Failed,
            }
        });

        let result = VerificationResult {
            id,
            final_status,
            attempts: all_results.len() as u32,
            all_results,
            created_at,
            completed_at: Utc::now(),
        };

        info!(
            "Verification completed: id={}, status={}, attempts={}",
            result.id, result.final_status, result.attempts
        );

        if let Some(cache) = &self.cache {
            cache.put(&fp, &result).await;
        }

        Ok(result)
    }
}
