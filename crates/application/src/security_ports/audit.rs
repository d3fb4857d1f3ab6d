use async_trait::async_trait;

use rolegate_core::{AppResult, UserId};
use rolegate_domain::{AuditAction, AuditEntry, RoleId};

/// Query parameters for audit listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditQuery {
    /// Optional principal filter.
    pub user_id: Option<UserId>,
    /// Optional role filter.
    pub role_id: Option<RoleId>,
    /// Optional action filter.
    pub action: Option<AuditAction>,
    /// Maximum rows returned.
    pub limit: usize,
    /// Number of rows skipped for offset pagination.
    pub offset: usize,
}

impl Default for AuditQuery {
    fn default() -> Self {
        Self {
            user_id: None,
            role_id: None,
            action: None,
            limit: 100,
            offset: 0,
        }
    }
}

impl AuditQuery {
    /// Returns whether `entry` passes the filters.
    #[must_use]
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.user_id
            .is_none_or(|user_id| entry.subject_user() == Some(user_id))
            && self
                .role_id
                .is_none_or(|role_id| entry.subject_role() == Some(role_id))
            && self.action.is_none_or(|action| entry.action() == action)
    }
}

/// Append-only provenance writer.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Appends one entry. Failures are returned, never dropped.
    async fn append(&self, entry: AuditEntry) -> AppResult<()>;

    /// Appends entries in order, stopping at the first failure.
    ///
    /// Sinks that can commit a batch as one unit should override this.
    async fn append_all(&self, entries: Vec<AuditEntry>) -> AppResult<()> {
        for entry in entries {
            self.append(entry).await?;
        }
        Ok(())
    }

    /// Lists entries in append order.
    async fn entries(&self, query: AuditQuery) -> AppResult<Vec<AuditEntry>>;
}
