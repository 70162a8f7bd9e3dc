//! In-process roadmap store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use super::backend::RoadmapStore;
use crate::models::RoadmapDocument;
use crate::{Error, Result};

/// Keeps documents in a map. Writes can be made to fail or to take time,
/// which is how rollback and ordering behavior is exercised without a
/// network.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<String, RoadmapDocument>>,
    fail_remaining: AtomicUsize,
    writes: AtomicUsize,
    latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every write by `latency` before it takes effect.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Seed a stored document.
    pub async fn insert(&self, project_id: impl Into<String>, document: RoadmapDocument) {
        self.documents.lock().await.insert(project_id.into(), document);
    }

    /// Make the next `count` writes fail.
    pub fn fail_next(&self, count: usize) {
        self.fail_remaining.store(count, Ordering::SeqCst);
    }

    /// Number of writes that reached the store successfully.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// The stored document, as written (not normalized).
    pub async fn document(&self, project_id: &str) -> Option<RoadmapDocument> {
        self.documents.lock().await.get(project_id).cloned()
    }

    fn take_failure(&self) -> bool {
        self.fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl RoadmapStore for MemoryStore {
    async fn persist(&self, project_id: &str, document: &RoadmapDocument) -> Result<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.take_failure() {
            return Err(Error::Other(format!(
                "store rejected write for project {}",
                project_id
            )));
        }
        self.documents
            .lock()
            .await
            .insert(project_id.to_string(), document.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load(&self, project_id: &str) -> Result<RoadmapDocument> {
        let documents = self.documents.lock().await;
        let document = documents
            .get(project_id)
            .ok_or_else(|| Error::NotFound(format!("roadmap for project {}", project_id)))?;
        document.normalized()
    }

    fn location(&self) -> String {
        "memory".to_string()
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
