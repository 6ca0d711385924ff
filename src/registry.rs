//! Completed-result lookup by verification id

use std::collections::{HashMap, VecDeque};

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::model::VerificationResult;

/// Upper bound on retained results; oldest entries are evicted first.
const MAX_RESULTS: usize = 1024;

/// Process-local registry backing GET /verify/{id}.
///
/// Results are inserted once, after completion, and handed out as
/// read-only clones. Retention is best-effort: once the registry is
/// full, each insert evicts the oldest entry.
pub struct ResultRegistry {
    inner: RwLock<Inner>,
    max_entries: usize,
}

struct Inner {
    results: HashMap<Uuid, VerificationResult>,
    order: VecDeque<Uuid>,
}

impl Default for ResultRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultRegistry {
    pub fn new() -> Self {
        Self::with_capacity(MAX_RESULTS)
    }

    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                results: HashMap::new(),
                order: VecDeque::new(),
            }),
            max_entries: max_entries.max(1),
        }
    }

    pub async fn insert(&self, result: VerificationResult) {
        let mut inner = self.inner.write().await;
        while inner.order.len() >= self.max_entries {
            if let Some(evicted) = inner.order.pop_front() {
                inner.results.remove(&evicted);
            }
        }
        inner.order.push_back(result.id);
        inner.results.insert(result.id, result);
    }

    pub async fn get(&self, id: &Uuid) -> Option<VerificationResult> {
        self.inner.read().await.results.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttemptRecord, FinalStatus, SandboxRunResult, SandboxStatus};
    use chrono::Utc;

    fn result() -> VerificationResult {
        VerificationResult {
            id: Uuid::new_v4(),
            final_status: FinalStatus::Verified,
            attempts: 1,
            all_results: vec![AttemptRecord {
                attempt: 1,
                code: "print(42)".into(),
                sandbox_result: SandboxRunResult {
                    status: SandboxStatus::Ok,
                    stdout: "42\n".into(),
                    stderr: String::new(),
                    exit_code: Some(0),
                    duration_ms: 2,
                },
                test_results: vec![],
            }],
            created_at: Utc::now(),
            completed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let registry = ResultRegistry::new();
        let stored = result();
        let id = stored.id;

        registry.insert(stored).await;
        assert!(registry.get(&id).await.is_some());
        assert!(registry.get(&Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn test_oldest_entry_evicted_at_capacity() {
        let registry = ResultRegistry::with_capacity(2);
        let first = result();
        let second = result();
        let third = result();
        let (a, b, c) = (first.id, second.id, third.id);

        registry.insert(first).await;
        registry.insert(second).await;
        registry.insert(third).await;

        assert!(registry.get(&a).await.is_none());
        assert!(registry.get(&b).await.is_some());
        assert!(registry.get(&c).await.is_some());
    }
}
