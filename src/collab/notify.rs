//! Fire-and-forget result notifications

use std::time::Duration;

use serde_json::json;
use tracing::{debug, warn};

use crate::model::VerificationResult;

/// Posts a final-result summary to a webhook, off the request path.
///
/// Delivery is best-effort: the post runs on its own task and failures
/// are only logged, so notification can never block or fail a
/// verification.
pub struct Notifier {
    client: reqwest::Client,
    url: Option<String>,
}

impl Notifier {
    pub fn new(url: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { client, url }
    }

    pub fn notify(&self, result: &VerificationResult) {
        let Some(url) = self.url.clone() else {
            return;
        };

        let payload = json!({
            "id": result.id,
            "final_status": result.final_status,
            "attempts": result.attempts,
            "completed_at": result.completed_at,
        });
        let client = self.client.clone();

        tokio::spawn(async move {
            match client.post(&url).json(&payload).send().await {
                Ok(_) => debug!("Posted verification notification to {}", url),
                Err(e) => warn!("Failed to post verification notification: {:#}", e),
            }
        });
    }
}
