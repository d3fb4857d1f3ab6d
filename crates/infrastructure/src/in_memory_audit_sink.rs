use async_trait::async_trait;
use tokio::sync::RwLock;

use rolegate_application::{AuditQuery, AuditSink};
use rolegate_core::AppResult;
use rolegate_domain::AuditEntry;

/// In-memory append-only audit log.
#[derive(Default)]
pub struct InMemoryAuditSink {
    entries: RwLock<Vec<AuditEntry>>,
}

impl InMemoryAuditSink {
    /// Creates an empty audit log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn append(&self, entry: AuditEntry) -> AppResult<()> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn append_all(&self, entries: Vec<AuditEntry>) -> AppResult<()> {
        self.entries.write().await.extend(entries);
        Ok(())
    }

    async fn entries(&self, query: AuditQuery) -> AppResult<Vec<AuditEntry>> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .filter(|entry| query.matches(entry))
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect())
    }
}
