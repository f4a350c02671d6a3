//! The pluggable provisioning seam.
//!
//! Concrete hypervisor backends live outside the core; what ships here is
//! the narrow interface every backend satisfies and an in-memory fake for
//! tests and local runs. Provision and teardown are asynchronous: a created
//! runner counts only once its process registers `session:{id}`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerStatus {
    Provisioning,
    Online,
    Terminating,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerInstance {
    pub id: String,
    pub status: RunnerStatus,
}

#[async_trait]
pub trait CapacityBackend: Send + Sync {
    /// Every provisioned runner with its status. An empty result is treated
    /// as a possible outage by the reconciler.
    async fn list(&self) -> anyhow::Result<Vec<RunnerInstance>>;

    /// Begin provisioning a runner under the given stable ID.
    async fn create(&self, id: &str) -> anyhow::Result<()>;

    /// Begin tearing a runner down.
    async fn destroy(&self, id: &str) -> anyhow::Result<()>;
}

/// Fake backend: runners come online instantly, and an outage can be
/// simulated to exercise the reconciliation guard.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    inner: Arc<Mutex<InMemoryState>>,
}

#[derive(Default)]
struct InMemoryState {
    runners: HashMap<String, RunnerStatus>,
    list_outage: bool,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed a runner, e.g. one provisioned before this provider ran.
    pub async fn seed(&self, id: &str, status: RunnerStatus) {
        self.inner
            .lock()
            .await
            .runners
            .insert(id.to_string(), status);
    }

    pub async fn set_status(&self, id: &str, status: RunnerStatus) {
        if let Some(entry) = self.inner.lock().await.runners.get_mut(id) {
            *entry = status;
        }
    }

    /// While set, `list()` reports nothing, as a failing backend would.
    pub async fn set_list_outage(&self, outage: bool) {
        self.inner.lock().await.list_outage = outage;
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.inner.lock().await.runners.contains_key(id)
    }
}

#[async_trait]
impl CapacityBackend for InMemoryBackend {
    async fn list(&self) -> anyhow::Result<Vec<RunnerInstance>> {
        let state = self.inner.lock().await;
        if state.list_outage {
            return Ok(Vec::new());
        }
        let mut runners: Vec<RunnerInstance> = state
            .runners
            .iter()
            .map(|(id, status)| RunnerInstance {
                id: id.clone(),
                status: *status,
            })
            .collect();
        runners.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(runners)
    }

    async fn create(&self, id: &str) -> anyhow::Result<()> {
        self.inner
            .lock()
            .await
            .runners
            .insert(id.to_string(), RunnerStatus::Online);
        Ok(())
    }

    async fn destroy(&self, id: &str) -> anyhow::Result<()> {
        self.inner.lock().await.runners.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_list_destroy() {
        let backend = InMemoryBackend::new();
        backend.create("session-1").await.unwrap();
        backend.create("session-2").await.unwrap();
        let listed = backend.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|r| r.status == RunnerStatus::Online));

        backend.destroy("session-1").await.unwrap();
        assert!(!backend.contains("session-1").await);
        assert!(backend.contains("session-2").await);
    }

    #[tokio::test]
    async fn test_outage_hides_runners() {
        let backend = InMemoryBackend::new();
        backend.create("session-1").await.unwrap();
        backend.set_list_outage(true).await;
        assert!(backend.list().await.unwrap().is_empty());
        backend.set_list_outage(false).await;
        assert_eq!(backend.list().await.unwrap().len(), 1);
    }
}
