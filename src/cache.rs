//! Best-effort content-addressed result cache
//!
//! Completed verifications are keyed by a deterministic fingerprint of the
//! request. The cache is a latency optimization only: any Redis failure
//! degrades to a fresh verification and is never surfaced to the caller.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::model::{ExecutionRequest, VerificationResult};

const CACHE_KEY_PREFIX: &str = "verify:cache:";

/// Deterministic fingerprint of (code, language, test_cases, dependencies)
pub fn fingerprint(request: &ExecutionRequest) -> String {
    let mut hasher = Sha256::new();
    hasher.update(request.code.as_bytes());
    hasher.update([0u8]);
    hasher.update(request.language.to_lowercase().as_bytes());
    hasher.update([0u8]);
    // Test cases in submission order; a different order is a different run.
    let cases = serde_json::to_string(&request.test_cases).unwrap_or_default();
    hasher.update(cases.as_bytes());
    hasher.update([0u8]);
    // BTreeSet iterates sorted, so the dependency set hashes canonically.
    for dep in &request.dependencies {
        hasher.update(dep.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

/// Cache seam consulted and updated by the verification loop
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn get(&self, fp: &str) -> Option<VerificationResult>;
    async fn put(&self, fp: &str, result: &VerificationResult);
}

/// Redis-backed result store
pub struct RedisResultStore {
    conn: MultiplexedConnection,
    ttl_secs: u64,
}

impl RedisResultStore {
    pub async fn connect(redis_url: &str, ttl_secs: u64) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        info!("Connected result cache to Redis at {}", redis_url);
        Ok(Self { conn, ttl_secs })
    }

    fn key(fp: &str) -> String {
        format!("{}{}", CACHE_KEY_PREFIX, fp)
    }
}

#[async_trait]
impl ResultStore for RedisResultStore {
    async fn get(&self, fp: &str) -> Option<VerificationResult> {
        let mut conn = self.conn.clone();
        let value: Option<String> = match redis::cmd("GET")
            .arg(Self::key(fp))
            .query_async(&mut conn)
            .await
        {
            Ok(v) => v,
            Err(e) => {
                warn!("Result cache GET failed: {}", e);
                return None;
            }
        };

        let raw = value?;
        match serde_json::from_str(&raw) {
            Ok(result) => {
                debug!("Result cache hit for {}", fp);
                Some(result)
            }
            Err(e) => {
                warn!("Result cache entry for {} is malformed: {}", fp, e);
                None
            }
        }
    }

    async fn put(&self, fp: &str, result: &VerificationResult) {
        let raw = match serde_json::to_string(result) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to serialize result for cache: {}", e);
                return;
            }
        };

        // NX: the first completed verification for a fingerprint wins;
        // concurrent duplicates do not clobber each other.
        let mut conn = self.conn.clone();
        if let Err(e) = redis::cmd("SET")
            .arg(Self::key(fp))
            .arg(raw)
            .arg("NX")
            .arg("EX")
            .arg(self.ttl_secs)
            .query_async::<()>(&mut conn)
            .await
        {
            warn!("Result cache SET failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn request(code: &str) -> ExecutionRequest {
        ExecutionRequest {
            code: code.into(),
            language: "python".into(),
            test_cases: vec![],
            dependencies: BTreeSet::new(),
            entry_point: None,
            timeout_seconds: None,
            memory_limit_mb: None,
            max_retries: None,
        }
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let a = fingerprint(&request("print(1)"));
        let b = fingerprint(&request("print(1)"));
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_fingerprint_varies_with_inputs() {
        let base = fingerprint(&request("print(1)"));
        assert_ne!(base, fingerprint(&request("print(2)")));

        let mut other = request("print(1)");
        other.language = "bash".into();
        assert_ne!(base, fingerprint(&other));

        let mut with_deps = request("print(1)");
        with_deps.dependencies.insert("requests".into());
        assert_ne!(base, fingerprint(&with_deps));

        let mut with_tests = request("print(1)");
        with_tests.test_cases.push(crate::model::TestCase {
            input: json!(1),
            expected_output: json!(1),
            description: String::new(),
        });
        assert_ne!(base, fingerprint(&with_tests));
    }

    #[test]
    fn test_fingerprint_ignores_dependency_order() {
        let mut a = request("print(1)");
        a.dependencies.insert("b".into());
        a.dependencies.insert("a".into());

        let mut b = request("print(1)");
        b.dependencies.insert("a".into());
        b.dependencies.insert("b".into());

        assert_eq!(fingerprint(&a), fingerprint(&b));
    }
}
