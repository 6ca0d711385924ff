//! HTTP client for the test-generation collaborator

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::TestGenerator;
use crate::model::TestCase;

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    test_cases: Vec<TestCase>,
}

/// Test generator backed by an external HTTP collaborator.
///
/// "No tests" is a valid, verifiable state: every failure mode here
/// (not configured, unreachable, malformed response, timeout) degrades
/// to an empty sequence.
pub struct HttpTestGenerator {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl HttpTestGenerator {
    pub fn new(base_url: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { client, base_url }
    }

    async fn request(&self, url: &str, code: &str, language: &str) -> anyhow::Result<Vec<TestCase>> {
        let response = self
            .client
            .post(format!("{}/generate-tests", url.trim_end_matches('/')))
            .json(&json!({ "code": code, "language": language }))
            .send()
            .await?
            .error_for_status()?;

        let body: GenerateResponse = response.json().await?;
        Ok(body.test_cases)
    }
}

#[async_trait]
impl TestGenerator for HttpTestGenerator {
    async fn generate(&self, code: &str, language: &str) -> Vec<TestCase> {
        let Some(url) = &self.base_url else {
            return vec![];
        };

        match self.request(url, code, language).await {
            Ok(cases) => cases,
            Err(e) => {
                warn!("Test generation collaborator unavailable: {:#}", e);
                vec![]
            }
        }
    }
}
