//! HTTP client for the code-regeneration collaborator

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::{FailureEvidence, Regenerator};

/// Transient-failure retries for one repair call; independent of the
/// verification loop's own attempt budget.
const TRANSIENT_RETRIES: u32 = 2;
const RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Deserialize)]
struct RepairResponse {
    #[serde(default)]
    code: Option<String>,
}

/// Regeneration client backed by an external HTTP collaborator.
///
/// Returns "no candidate" rather than an error when the collaborator is
/// unreachable, responds with something unusable, or echoes the failing
/// code back unchanged.
pub struct HttpRegenerator {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl HttpRegenerator {
    pub fn new(base_url: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { client, base_url }
    }

    async fn request(
        &self,
        url: &str,
        code: &str,
        language: &str,
        evidence: &FailureEvidence,
    ) -> anyhow::Result<Option<String>> {
        let response = self
            .client
            .post(format!("{}/repair", url.trim_end_matches('/')))
            .json(&json!({
                "code": code,
                "language": language,
                "failure_evidence": evidence,
            }))
            .send()
            .await?
            .error_for_status()?;

        let body: RepairResponse = response.json().await?;
        Ok(body.code)
    }
}

#[async_trait]
impl Regenerator for HttpRegenerator {
    async fn repair(
        &self,
        previous_code: &str,
        language: &str,
        evidence: &FailureEvidence,
    ) -> Option<String> {
        let url = self.base_url.as_ref()?;

        let mut last_error = None;
        for attempt in 0..TRANSIENT_RETRIES {
            match self.request(url, previous_code, language, evidence).await {
                Ok(candidate) => {
                    return accept_candidate(previous_code, candidate);
                }
                Err(e) => {
                    debug!("Repair call attempt {} failed: {:#}", attempt + 1, e);
                    last_error = Some(e);
                    if attempt + 1 < TRANSIENT_RETRIES {
                        sleep(RETRY_DELAY).await;
                    }
                }
            }
        }

        if let Some(e) = last_error {
            warn!("Regeneration collaborator unavailable: {:#}", e);
        }
        None
    }
}

/// A candidate is only usable if it is non-empty and actually different
/// from the code that just failed.
fn accept_candidate(previous_code: &str, candidate: Option<String>) -> Option<String> {
    let candidate = candidate?;
    if candidate.trim().is_empty() {
        return None;
    }
    if candidate.trim() == previous_code.trim() {
        return None;
    }
    Some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SandboxStatus;

    fn evidence() -> FailureEvidence {
        FailureEvidence {
            status: SandboxStatus::RuntimeError,
            stdout: String::new(),
            stderr: "boom".into(),
            exit_code: Some(1),
            failing_tests: vec![],
        }
    }

    #[test]
    fn test_unchanged_candidate_rejected() {
        assert_eq!(accept_candidate("x = 1", Some("x = 1".into())), None);
        assert_eq!(accept_candidate("x = 1", Some("x = 1\n".into())), None);
    }

    #[test]
    fn test_empty_candidate_rejected() {
        assert_eq!(accept_candidate("x = 1", Some("  \n".into())), None);
        assert_eq!(accept_candidate("x = 1", None), None);
    }

    #[test]
    fn test_changed_candidate_accepted() {
        assert_eq!(
            accept_candidate("x = 1", Some("x = 2".into())),
            Some("x = 2".into())
        );
    }

    #[tokio::test]
    async fn test_unconfigured_client_returns_no_candidate() {
        let client = HttpRegenerator::new(None, Duration::from_secs(1));
        assert!(client.repair("x = 1", "python", &evidence()).await.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_collaborator_returns_no_candidate() {
        let client = HttpRegenerator::new(
            Some("http://127.0.0.1:1".into()),
            Duration::from_millis(200),
        );
        assert!(client.repair("x = 1", "python", &evidence()).await.is_none());
    }
}
